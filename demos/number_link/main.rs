use std::fs::File;
use std::path::PathBuf;
use std::process::exit;

use parastar::domains::number_link::parse_instance;
use parastar::Engine;
use structopt::StructOpt;

/// Solves a number-link instance with the parallel A* engine.
#[derive(Debug, StructOpt)]
#[structopt(name = "number-link")]
struct Opt {
    /// File with a header line `rows cols` followed by the grid, one line
    /// per row, `.` for open cells and matching digits for a colour's ends.
    instance: PathBuf,

    /// Number of worker threads. 0 (the default) runs the sequential engine.
    #[structopt(short = "n", long, default_value = "0")]
    workers: usize,

    /// Stop at the first goal any worker finds, rather than the cheapest.
    #[structopt(short = "p", long)]
    first: bool,
}

fn main() {
    env_logger::init();
    let opt = Opt::from_args();

    let file = match File::open(&opt.instance) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("could not open {}: {}", opt.instance.display(), e);
            exit(1);
        }
    };

    let (puzzle, initial) = match parse_instance(file) {
        Ok(parsed) => parsed,
        Err(e) => {
            eprintln!("could not parse {}: {}", opt.instance.display(), e);
            exit(1);
        }
    };

    let worker_count = opt.workers.max(1);
    let engine = Engine::new(puzzle, worker_count).expect("worker_count is at least 1");

    match engine.solve(&initial, None, opt.first) {
        Some(solution) => println!("solved: cost = {}, first-solution = {}", solution.cost, opt.first),
        None => println!("no solution found"),
    }

    let stats = engine.stats();
    for (w, snapshot) in stats.per_worker.iter().enumerate() {
        println!("- worker #{}: expanded = {}, visited = {}", w + 1, snapshot.expanded, snapshot.visited);
    }
    println!("- total expanded = {}, total visited = {}", stats.expanded(), stats.visited());
}

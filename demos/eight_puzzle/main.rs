use std::fs::File;
use std::path::PathBuf;
use std::process::exit;

use parastar::domains::eight_puzzle::{parse_instances, EightPuzzle};
use parastar::Engine;
use structopt::StructOpt;

/// Solves 8-puzzle instances with the parallel A* engine.
#[derive(Debug, StructOpt)]
#[structopt(name = "eight-puzzle")]
struct Opt {
    /// File with one board per line, nine characters from {1..8,-}.
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

    let instances = match parse_instances(file) {
        Ok(instances) => instances,
        Err(e) => {
            eprintln!("could not parse {}: {}", opt.instance.display(), e);
            exit(1);
        }
    };

    let worker_count = opt.workers.max(1);
    let problem = EightPuzzle::new();
    let engine = Engine::new(problem, worker_count).expect("worker_count is at least 1");

    for (idx, board) in instances.iter().enumerate() {
        println!("instance #{}", idx + 1);
        match engine.solve(board, None, opt.first) {
            Some(solution) => {
                println!("solved: cost = {}, first-solution = {}", solution.cost, opt.first);
                for row in solution.path.last().unwrap().chunks(3) {
                    println!("{}", String::from_utf8_lossy(row));
                }
            }
            None => println!("no solution found"),
        }

        let stats = engine.stats();
        for (w, snapshot) in stats.per_worker.iter().enumerate() {
            println!(
                "- worker #{}: expanded = {}, visited = {}",
                w + 1,
                snapshot.expanded,
                snapshot.visited
            );
        }
        println!("- total expanded = {}, total visited = {}", stats.expanded(), stats.visited());
        println!();
    }
}

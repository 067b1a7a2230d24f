use clap::Parser;
use coarsetime::Instant;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use rebuildset::{Error, RebuildSet};

#[derive(Parser)]
#[command(name = "set_demo")]
struct Cli {
    /// How many ascending values to add in the bulk phase.
    #[arg(long, default_value_t = 10_000)]
    count: u32,
    /// How many values the small phase adds before the lookups and the snapshot.
    #[arg(long, default_value_t = 100)]
    small: u32,
    /// Also time inserting the bulk values in shuffled order.
    #[arg(long)]
    random: bool,
    /// Shuffling seed.
    #[arg(long, env = "SET_DEMO_SEED")]
    seed: Option<u64>,
}

fn timed_fill(values: impl IntoIterator<Item = u32>) -> (RebuildSet<u32>, f32) {
    let start_time = Instant::now();
    let mut set = RebuildSet::new();
    for v in values {
        set.insert(v);
    }
    let total_seconds = start_time.elapsed().as_nanos() as f32 / 1e9;
    (set, total_seconds)
}

fn main() {
    env_logger::init();
    let args = Cli::parse();

    let (mut set, seconds) = timed_fill(0..args.count);
    println!(
        "Tree is empty: {} Number of elements: {} ({} rebuilds, max height {}, {seconds:.3}s)",
        set.is_empty(),
        set.len(),
        set.rebuilds(),
        set.max_height()
    );

    let present = args.count / 2;
    println!("add({present}) -> {}", set.insert(present));
    println!("add({}) -> {}", args.count + 1, set.insert(args.count + 1));

    set.clear();
    println!("Test clear(): {}", set.is_empty());

    for v in 0..args.small {
        set.insert(v);
    }
    println!("contains({}) -> {}", args.small + 2, set.contains(&(args.small + 2)));
    println!("contains({}) -> {}", args.small / 5, set.contains(&(args.small / 5)));

    let mut snapshot = set.snapshot();
    println!("snapshot has next: {}", snapshot.has_next());
    match snapshot.try_next() {
        Ok(v) => println!("snapshot next: {v}"),
        Err(err) => println!("snapshot next failed: {err}"),
    }
    set.insert(args.small);
    match snapshot.try_next() {
        Err(Error::StructuralChange) => println!("snapshot refused after insert, as it should"),
        other => println!("unexpected snapshot result after insert: {other:?}"),
    }
    if let Err(err) = set.try_insert(None) {
        println!("try_insert(None) -> {err}");
    }
    println!("{set}");

    if args.random {
        let mut values: Vec<u32> = (0..args.count).collect();
        let rng = &mut match args.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        values.shuffle(rng);
        let (shuffled_set, seconds) = timed_fill(values);
        println!(
            "shuffled fill of {}: {} rebuilds, height {}, {seconds:.3}s",
            shuffled_set.len(),
            shuffled_set.rebuilds(),
            shuffled_set.height()
        );
    }
}

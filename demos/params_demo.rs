use clap::Parser;
use fch_hash::DefaultSeededHash;
use fch_hash::HashMap;
use fch_hash::MetaHashMap;
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::SmallRng;

#[derive(Parser, Debug)]
struct Args {
    /// Number of random keys to insert.
    #[arg(short = 'n', long = "count", default_value_t = 100_000)]
    count: usize,

    /// Fraction of keys to erase before the final report.
    #[arg(short = 'e', long = "erase", default_value_t = 0.5)]
    erase: f64,

    /// Use the byte-tagged (fingerprinted) table.
    #[arg(long = "meta", default_value_t = false)]
    meta: bool,

    /// Seed for the key stream and the table's rebuild schedule.
    #[arg(short = 's', long = "seed", default_value_t = 0xF00D)]
    seed: u64,
}

fn run<M: fch_hash::SlotMeta>(
    mut map: HashMap<u64, u64, DefaultSeededHash, u32, fch_hash::StandardKeys<u64>, M>,
    args: &Args,
) {
    let mut rng = SmallRng::seed_from_u64(args.seed);
    let mut keys = Vec::with_capacity(args.count);
    while keys.len() < args.count {
        let key: u64 = rng.random();
        if map.insert(key, key).is_none() {
            keys.push(key);
        }
    }
    println!("after {} inserts:   {}", keys.len(), map.params());

    let erase = (args.count as f64 * args.erase) as usize;
    for key in &keys[..erase] {
        map.remove(key);
    }
    println!("after {erase} erases:     {}", map.params());

    map.rehash(map.len());
    println!("after rehash:       {}", map.params());

    for key in &keys[erase..] {
        assert_eq!(map.get(key), Some(key));
    }

    let stats = map.build_stats();
    println!(
        "construction work:  rebuilds={} repairs={} seeds={} widenings={} bucket_factor={:.2}",
        stats.rebuilds, stats.repairs, stats.seed_attempts, stats.bucket_doublings, stats.bucket_factor,
    );
}

fn main() {
    let args = Args::parse();
    println!(
        "building a {} table over {} random u64 keys",
        if args.meta { "byte-tagged" } else { "bitmap" },
        args.count,
    );
    if args.meta {
        run(
            MetaHashMap::<u64, u64>::with_hasher(DefaultSeededHash::default()),
            &args,
        );
    } else {
        run(HashMap::with_seed(args.seed), &args);
    }
}

use std::path::PathBuf;

use rayon::prelude::*;

use kmer_tables::hashing::KmerHasher;
use kmer_tables::storage::MAX_NIBBLE_COUNT;
use kmer_tables::{
    ConsumeStats, Counttable, Nodetable, Record, SmallCounttable, TableError, TableResult,
    MAX_KCOUNT,
};

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("kmer-tables-{}-{}.kt", std::process::id(), name))
}

/// Deterministic pseudo-random reads (xorshift) so runs are repeatable.
fn synthetic_reads(n_reads: usize, len: usize) -> Vec<Record> {
    let mut state = 0x2545_f491_4f6c_dd1du64;
    (0..n_reads)
        .map(|ix| {
            let seq = (0..len)
                .map(|_| {
                    state ^= state << 13;
                    state ^= state >> 7;
                    state ^= state << 17;
                    b"ACGT"[(state % 4) as usize]
                })
                .collect::<Vec<u8>>();
            Record::new(format!("read{}", ix).as_bytes(), &seq)
        })
        .collect()
}

#[test]
fn bigcount_scenario() -> TableResult<()> {
    let table = Counttable::new(4, &[101, 103])?;
    for _ in 0..300 {
        table.add(b"AAAA")?;
    }
    assert_eq!(table.get_count(b"AAAA")?, MAX_KCOUNT);

    let mut table = Counttable::new(4, &[101, 103])?;
    table.set_use_bigcount(true);
    for _ in 0..300 {
        table.add(b"AAAA")?;
    }
    assert_eq!(table.get_count(b"AAAA")?, 300);
    Ok(())
}

#[test]
fn small_tables_saturate() -> TableResult<()> {
    let mut small = SmallCounttable::new(4, &[101, 103])?;
    small.set_use_bigcount(true);
    assert!(!small.get_use_bigcount());
    let nodes = Nodetable::new(4, &[101, 103])?;
    for _ in 0..40 {
        small.add(b"ACGT")?;
        nodes.add(b"ACGT")?;
    }
    assert_eq!(small.get_count(b"ACGT")?, MAX_NIBBLE_COUNT);
    assert_eq!(nodes.get_count(b"ACGT")?, 1);
    assert_eq!(nodes.get_count(b"TGCA")?, 0);
    Ok(())
}

#[test]
fn consume_string_scenario() -> TableResult<()> {
    let table = Counttable::new(4, &[101, 103])?;
    assert_eq!(table.consume_string(b"AAAATTTT")?, 5);
    assert_eq!(table.get_kmer_counts(b"AAAATTTT")?, vec![1, 1, 1, 1, 1]);
    Ok(())
}

#[test]
fn counts_never_undercount() -> TableResult<()> {
    // tiny tables force plenty of collisions
    let table = SmallCounttable::new(6, &[31, 37, 41])?;
    let hasher = KmerHasher::new(6)?;
    let mut truth = std::collections::HashMap::new();
    for read in synthetic_reads(50, 40) {
        for hashes in hasher.iter_kmers(&read.seq)? {
            let before = table.get_count_hash(hashes.forward);
            table.add_hash(hashes.forward);
            assert!(table.get_count_hash(hashes.forward) >= before);
            *truth.entry(hashes.forward).or_insert(0u32) += 1;
        }
    }
    for (&khash, &count) in &truth {
        let expected = count.min(u32::from(MAX_NIBBLE_COUNT));
        assert!(u32::from(table.get_count_hash(khash)) >= expected);
    }
    Ok(())
}

#[test]
fn invalid_symbol_leaves_table_alone() -> TableResult<()> {
    let table = Counttable::new(4, &[101])?;
    table.add(b"ACGT")?;
    match table.add(b"ACGN") {
        Err(TableError::InvalidSymbol { symbol: 'N', position: 3 }) => {}
        other => panic!("unexpected result {:?}", other),
    }
    assert_eq!(table.n_occupied(), 1);
    assert_eq!(table.n_unique_kmers(), 1);
    Ok(())
}

#[test]
fn trim_unseen_sequence() -> TableResult<()> {
    let table = Counttable::new(4, &[101, 103])?;
    assert_eq!(table.trim_on_abundance(b"AAAAAAAAAA", 1)?, 0);
    Ok(())
}

#[test]
fn median_of_uniform_counts() -> TableResult<()> {
    let table = Counttable::new(4, &[101, 103])?;
    for _ in 0..7 {
        table.consume_string(b"ACGTTGCA")?;
    }
    let stats = table.get_median_count(b"ACGTTGCA")?;
    assert_eq!(stats.median, 7);
    assert!((stats.average - 7.0).abs() < 1e-9);
    assert_eq!(stats.stddev, 0.0);
    Ok(())
}

#[test]
fn consume_fasta_file() -> TableResult<()> {
    let table = Counttable::new(4, &[1009, 1013])?;
    let stats = table.consume_fasta("tests/data/reads.fa")?;
    assert_eq!(
        stats,
        ConsumeStats {
            total_reads: 5,
            n_consumed: 9 + 9 + 5,
            n_skipped: 2,
        }
    );
    assert_eq!(table.get_count(b"ACGT")?, 2);
    assert_eq!(table.get_count(b"TTTT")?, 5);
    assert_eq!(table.get_count(b"GCAA")?, 2);

    let stats = table.consume_fasta("tests/data/reads.fq")?;
    assert_eq!(stats.total_reads, 2);
    assert_eq!(stats.n_consumed, 7 + 3);
    assert_eq!(table.get_count(b"CAAG")?, 4);

    assert!(table.consume_fasta("tests/data/missing.fa").is_err());
    Ok(())
}

#[test]
fn abundance_distribution_file() -> TableResult<()> {
    let table = Counttable::new(4, &[1009, 1013])?;
    table.consume_fasta("tests/data/reads.fa")?;
    let tracking = Nodetable::new(4, &[1009, 1013])?;
    let dist = table.abundance_distribution("tests/data/reads.fa", &tracking)?;
    // 9 distinct k-mers from read1/read2 seen twice, TTTT seen 5 times
    assert_eq!(dist.histogram[2], 9);
    assert_eq!(dist.histogram[5], 1);
    assert_eq!(dist.histogram.iter().sum::<u64>(), 10);
    assert_eq!(dist.stats.n_skipped, 2);
    Ok(())
}

#[test]
fn parallel_matches_serial() -> TableResult<()> {
    let reads = synthetic_reads(500, 100);
    let serial = SmallCounttable::new(8, &[10007, 10009])?;
    let parallel = SmallCounttable::new(8, &[10007, 10009])?;

    let serial_stats = serial.consume_records(reads.iter().cloned().map(Ok))?;
    let parallel_stats = parallel.consume_records_parallel(reads.iter().cloned().map(Ok))?;
    assert_eq!(serial_stats, parallel_stats);
    assert_eq!(serial_stats.n_consumed, 500 * 93);

    for read in &reads {
        assert_eq!(
            serial.get_kmer_counts(&read.seq)?,
            parallel.get_kmer_counts(&read.seq)?
        );
    }
    assert_eq!(serial.n_occupied(), parallel.n_occupied());
    Ok(())
}

#[test]
fn shared_table_across_threads() -> TableResult<()> {
    let mut table = Counttable::new(4, &[101])?;
    table.set_use_bigcount(true);
    (0..8).into_par_iter().for_each(|_| {
        for _ in 0..100 {
            table.add_hash(7);
        }
    });
    assert_eq!(table.get_count_hash(7), 800);
    Ok(())
}

#[test]
fn save_load_round_trip() -> TableResult<()> {
    let path = temp_path("counttable");
    let mut table = Counttable::new(5, &[101, 103])?;
    table.set_use_bigcount(true);
    for _ in 0..400 {
        table.add(b"GATTA")?;
    }
    table.consume_fasta("tests/data/reads.fa")?;
    table.save(&path)?;

    let mut loaded = Counttable::new(5, &[101, 103])?;
    loaded.load(&path)?;
    std::fs::remove_file(&path)?;

    assert!(loaded.get_use_bigcount());
    assert_eq!(loaded.get_count(b"GATTA")?, 400);
    assert_eq!(loaded.n_occupied(), table.n_occupied());
    assert_eq!(loaded.n_unique_kmers(), table.n_unique_kmers());
    assert_eq!(loaded.tablesizes(), table.tablesizes());
    for read in synthetic_reads(20, 30) {
        assert_eq!(
            loaded.get_kmer_counts(&read.seq)?,
            table.get_kmer_counts(&read.seq)?
        );
    }
    // the loaded table keeps counting where the saved one left off
    loaded.add(b"GATTA")?;
    assert_eq!(loaded.get_count(b"GATTA")?, 401);
    Ok(())
}

#[test]
fn load_takes_k_from_file() -> TableResult<()> {
    let path = temp_path("nodetable");
    let table = Nodetable::new(4, &[11, 13])?;
    table.add(b"ACGT")?;
    table.save(&path)?;

    let mut loaded = Nodetable::new(7, &[5])?;
    loaded.load(&path)?;
    std::fs::remove_file(&path)?;
    assert_eq!(loaded.ksize(), 4);
    assert_eq!(loaded.n_tables(), 2);
    assert_eq!(loaded.get_count(b"ACGT")?, 1);
    assert_eq!(loaded.raw_tables().len(), 2);
    Ok(())
}

#[test]
fn load_rejects_other_variant() -> TableResult<()> {
    let path = temp_path("small");
    let small = SmallCounttable::new(4, &[11])?;
    small.add(b"ACGT")?;
    small.save(&path)?;

    let mut table = Counttable::new(6, &[17])?;
    table.add(b"CCCCCC")?;
    let result = table.load(&path);
    std::fs::remove_file(&path)?;
    assert!(matches!(result, Err(TableError::MalformedPersistedState(_))));
    // untouched by the failed load
    assert_eq!(table.ksize(), 6);
    assert_eq!(table.tablesizes(), &[17]);
    assert_eq!(table.get_count(b"CCCCCC")?, 1);
    Ok(())
}

#[test]
fn load_rejects_garbage() -> TableResult<()> {
    let path = temp_path("garbage");
    std::fs::write(&path, b"this is not a table file")?;
    let mut table = Counttable::new(4, &[11])?;
    let result = table.load(&path);
    std::fs::remove_file(&path)?;
    assert!(matches!(result, Err(TableError::MalformedPersistedState(_))));

    assert!(matches!(
        table.load(temp_path("never-written")),
        Err(TableError::Io(_))
    ));
    Ok(())
}

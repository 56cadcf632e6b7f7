//! Seeded shuffle and train/val/test split of the record pool.

use crate::io::manifest::Record;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Seed of the corpus shuffle. Changing it changes every split's composition.
pub const SHUFFLE_SEED: u64 = 42;

/// The three disjoint parts of the corpus.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CorpusSplit {
    pub train: Vec<Record>,
    pub val: Vec<Record>,
    pub test: Vec<Record>,
}

impl CorpusSplit {
    pub fn len(&self) -> usize {
        self.train.len() + self.val.len() + self.test.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Cut indices `floor(0.8 * n)` and `floor(0.9 * n)`.
pub fn split_points(n: usize) -> (usize, usize) {
    ((0.8 * n as f64) as usize, (0.9 * n as f64) as usize)
}

/// Shuffle `records` with [`SHUFFLE_SEED`] and split them 80/10/10 by position.
///
/// Train captions are collapsed to their first string; val and test keep
/// the sequence form.
pub fn shuffle_and_split(mut records: Vec<Record>) -> CorpusSplit {
    let mut rng = StdRng::seed_from_u64(SHUFFLE_SEED);
    records.shuffle(&mut rng);

    let (train_end, val_end) = split_points(records.len());
    let test = records.split_off(val_end);
    let val = records.split_off(train_end);
    let train = records
        .into_iter()
        .map(|record| Record {
            caption: record.caption.into_text(),
            ..record
        })
        .collect();

    CorpusSplit { train, val, test }
}

use pricegate_core::{Error, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Row indices of a seeded train/validation partition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainValidationSplit {
    pub train: Vec<usize>,
    pub validation: Vec<usize>,
}

/// Shuffle `0..n` with `seed` and hold out `ceil(ratio * n)` rows for
/// validation. Both partitions must be non-empty.
pub fn train_validation_split(n: usize, ratio: f64, seed: u64) -> Result<TrainValidationSplit> {
    if n < 2 {
        return Err(Error::DegenerateTrainingSet(format!(
            "{n} labeled rows cannot be split into training and validation"
        )));
    }
    if !(ratio > 0.0 && ratio < 1.0) {
        return Err(Error::InvalidConfig(format!(
            "validation ratio {ratio} must lie in (0, 1)"
        )));
    }

    let n_validation = (ratio * n as f64).ceil() as usize;
    if n_validation == 0 || n_validation >= n {
        return Err(Error::DegenerateTrainingSet(format!(
            "validation ratio {ratio} leaves an empty partition for {n} rows"
        )));
    }

    let mut order: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    order.shuffle(&mut rng);

    let train = order.split_off(n_validation);
    Ok(TrainValidationSplit {
        train,
        validation: order,
    })
}

use std::io::BufRead;
use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

use common::{Error, Result};

/// Supplies the immutable price path a run is simulated over.
///
/// Implementations must be replayable: the same source yields the same
/// prices on every call.
pub trait TickSource {
    /// The first `count` prices of the path, oldest first.
    fn prices(&self, count: usize) -> Result<Vec<f64>>;
}

/// Gaussian random walk: `start + cumsum(N(0, 1) * volatility)`.
#[derive(Debug, Clone, PartialEq)]
pub struct RandomWalk {
    seed: u64,
    start_price: f64,
    volatility: f64,
}

impl RandomWalk {
    pub fn new(seed: u64, start_price: f64, volatility: f64) -> Result<Self> {
        if !start_price.is_finite() {
            return Err(Error::Config("start price must be finite".into()));
        }
        if !volatility.is_finite() || volatility < 0.0 {
            return Err(Error::Config(
                "volatility must be finite and non-negative".into(),
            ));
        }
        Ok(Self {
            seed,
            start_price,
            volatility,
        })
    }
}

impl TickSource for RandomWalk {
    fn prices(&self, count: usize) -> Result<Vec<f64>> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut price = self.start_price;

        Ok((0..count)
            .map(|_| {
                let shock: f64 = rng.sample(StandardNormal);
                price += shock * self.volatility;
                price
            })
            .collect())
    }
}

/// Replays prices from a text file, one price per line. Blank lines and
/// lines starting with `#` are skipped.
#[derive(Debug, Clone)]
pub struct ReplayFile {
    path: PathBuf,
}

impl ReplayFile {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl TickSource for ReplayFile {
    fn prices(&self, count: usize) -> Result<Vec<f64>> {
        let file = std::fs::File::open(&self.path)?;
        let prices = parse_prices(std::io::BufReader::new(file))?;

        if prices.len() < count {
            return Err(Error::Config(format!(
                "replay file '{}' holds {} prices, {count} requested",
                self.path.display(),
                prices.len()
            )));
        }
        Ok(prices.into_iter().take(count).collect())
    }
}

fn parse_prices(reader: impl BufRead) -> Result<Vec<f64>> {
    let mut prices = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let price: f64 = trimmed.parse().map_err(|_| {
            Error::Config(format!("line {}: invalid price '{trimmed}'", idx + 1))
        })?;
        if !price.is_finite() {
            return Err(Error::Config(format!(
                "line {}: price must be finite",
                idx + 1
            )));
        }
        prices.push(price);
    }
    Ok(prices)
}

#[cfg(test)]
mod tests {
    use std::time::{SystemTime, UNIX_EPOCH};

    use super::*;

    #[test]
    fn seeded_walk_is_deterministic() {
        let a = RandomWalk::new(42, 100.0, 0.1).unwrap().prices(500).unwrap();
        let b = RandomWalk::new(42, 100.0, 0.1).unwrap().prices(500).unwrap();
        let c = RandomWalk::new(7, 100.0, 0.1).unwrap().prices(500).unwrap();

        assert_eq!(a.len(), 500);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn shorter_request_is_a_prefix() {
        let walk = RandomWalk::new(3, 50.0, 0.5).unwrap();
        let long = walk.prices(100).unwrap();
        let short = walk.prices(30).unwrap();
        assert_eq!(short[..], long[..30]);
    }

    #[test]
    fn zero_volatility_is_flat() {
        let prices = RandomWalk::new(1, 100.0, 0.0).unwrap().prices(10).unwrap();
        assert!(prices.iter().all(|&p| p == 100.0));
    }

    #[test]
    fn rejects_invalid_parameters() {
        assert!(RandomWalk::new(1, f64::NAN, 0.1).is_err());
        assert!(RandomWalk::new(1, 100.0, -0.1).is_err());
    }

    #[test]
    fn parses_prices_skipping_comments() {
        let input = "# header\n100.0\n\n 100.5 \n99.75\n";
        let prices = parse_prices(input.as_bytes()).unwrap();
        assert_eq!(prices, vec![100.0, 100.5, 99.75]);
    }

    #[test]
    fn reports_bad_line_number() {
        let err = parse_prices("100.0\nabc\n".as_bytes()).unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("line 2")));
    }

    #[test]
    fn replay_file_truncates_and_checks_length() {
        let unique = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let path = std::env::temp_dir().join(format!("velocis-replay-{unique}.txt"));
        std::fs::write(&path, "1.0\n2.0\n3.0\n").unwrap();

        let source = ReplayFile::new(&path);
        assert_eq!(source.prices(2).unwrap(), vec![1.0, 2.0]);
        assert!(source.prices(4).is_err());

        std::fs::remove_file(&path).unwrap();
    }
}

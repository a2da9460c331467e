/// Trailing feature window for tick `tick`: the `width` prices
/// `[tick - width, tick)`, oldest first.
///
/// Returns `None` during warmup (`tick < width`) or when `tick` lies beyond
/// the price sequence. The price at `tick` itself is never included, so a
/// decision for tick `i` cannot see its own outcome.
pub fn feature_window(prices: &[f64], tick: usize, width: usize) -> Option<&[f64]> {
    if width == 0 || tick < width || tick > prices.len() {
        return None;
    }
    Some(&prices[tick - width..tick])
}

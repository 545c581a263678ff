use anyhow::Result;
use rand::prelude::*;
use rand::distr::Uniform;

/// Bootstrap estimate of the mean first-passage time: `num_resamples`
/// resamples of size `|sample|` are drawn with replacement, the mean of each
/// is taken, and the returned pair is (mean of resample means, population
/// standard deviation of resample means). Makes no normality assumption
/// about the underlying FPT distribution, which is typically heavy-tailed.
pub fn bootstrap_mfpt(sample: &[f64], num_resamples: usize) -> Result<(f64, f64)> {
    bootstrap_mfpt_with_rng(sample, num_resamples, &mut rand::rng())
}

pub fn bootstrap_mfpt_with_rng<R: Rng>(
    sample: &[f64],
    num_resamples: usize,
    rng: &mut R,
) -> Result<(f64, f64)> {
    if sample.is_empty() {
        anyhow::bail!("Cannot bootstrap an empty first-passage-time sample.");
    }
    if num_resamples == 0 {
        anyhow::bail!("num_resamples must be at least 1.");
    }

    let index_dist = Uniform::new(0, sample.len())?;
    let inv_len = 1.0 / sample.len() as f64;
    let mut resample_means = Vec::with_capacity(num_resamples);
    for _ in 0..num_resamples {
        let sum: f64 = (0..sample.len()).map(|_| sample[rng.sample(index_dist)]).sum();
        resample_means.push(sum * inv_len);
    }

    let mfpt = resample_means.iter().sum::<f64>() / num_resamples as f64;
    let variance = resample_means
        .iter()
        .map(|m| (m - mfpt) * (m - mfpt))
        .sum::<f64>()
        / num_resamples as f64;
    Ok((mfpt, variance.sqrt()))
}

//! Трекер основной частоты YIN.
//!
//! Кадры центрируются (`frame_length / 2` нулей с каждой стороны), разностная
//! функция считается в окне `frame_length / 2` через FFT-корреляцию, период —
//! первый провал cumulative mean normalized difference ниже порога (или её
//! глобальный минимум), уточнённый параболической интерполяцией.

use rustfft::{num_complex::Complex, FftPlanner};

use recite_core::PitchConfig;

/// Keeps the normalization finite on silent frames.
const TINY: f64 = 1e-12;

/// One f0 estimate (Hz) per frame, clamped to `[fmin, fmax]`.
///
/// Always returns at least one frame for non-empty input; short input is
/// zero-padded.
pub fn track_pitch(samples: &[f32], config: &PitchConfig) -> Vec<f64> {
    if samples.is_empty() {
        return Vec::new();
    }

    let frame_length = config.frame_length;
    let hop = config.hop_length;
    let win = config.win_length();
    let min_period = config.min_period();
    let max_period = config.max_period();
    let pad = (frame_length / 2) as isize;

    let num_frames = 1 + samples.len() / hop;
    let fft_len = (frame_length + win).next_power_of_two();

    let mut planner = FftPlanner::<f64>::new();
    let forward = planner.plan_fft_forward(fft_len);
    let inverse = planner.plan_fft_inverse(fft_len);

    let n = samples.len() as isize;
    let mut frame = vec![0f64; frame_length];
    let mut f0 = Vec::with_capacity(num_frames);

    for frame_idx in 0..num_frames {
        let start = frame_idx as isize * hop as isize - pad;
        for (i, slot) in frame.iter_mut().enumerate() {
            let idx = start + i as isize;
            *slot = if (0..n).contains(&idx) {
                samples[idx as usize] as f64
            } else {
                0.0
            };
        }

        let diff = difference(&frame, win, max_period, fft_len, &*forward, &*inverse);
        let cmndf = cumulative_mean_normalized(&diff);
        let period = pick_period(&cmndf, min_period, max_period, config.trough_threshold);
        let hz = config.sample_rate as f64 / period;
        f0.push(hz.clamp(config.fmin, config.fmax));
    }
    f0
}

/// `d(tau) = sum_{j < win} (x[j] - x[j + tau])^2` for `tau` in `0..=max_period`.
fn difference(
    frame: &[f64],
    win: usize,
    max_period: usize,
    fft_len: usize,
    forward: &dyn rustfft::Fft<f64>,
    inverse: &dyn rustfft::Fft<f64>,
) -> Vec<f64> {
    // r(tau) = sum_j x[j] * x[j + tau], the first factor limited to the window.
    let mut head: Vec<Complex<f64>> = (0..fft_len)
        .map(|i| Complex::new(if i < win { frame[i] } else { 0.0 }, 0.0))
        .collect();
    let mut full: Vec<Complex<f64>> = (0..fft_len)
        .map(|i| Complex::new(frame.get(i).copied().unwrap_or(0.0), 0.0))
        .collect();
    forward.process(&mut head);
    forward.process(&mut full);
    let mut corr: Vec<Complex<f64>> = head
        .iter()
        .zip(&full)
        .map(|(h, f)| h.conj() * f)
        .collect();
    inverse.process(&mut corr);
    let scale = 1.0 / fft_len as f64;

    // Energy of x[tau .. tau + win] via prefix sums.
    let mut prefix = vec![0f64; frame.len() + 1];
    for (i, x) in frame.iter().enumerate() {
        prefix[i + 1] = prefix[i] + x * x;
    }
    let energy = |tau: usize| prefix[tau + win] - prefix[tau];

    let e0 = energy(0);
    (0..=max_period)
        .map(|tau| {
            let mut r = corr[tau].re * scale;
            if r.abs() < 1e-9 {
                r = 0.0;
            }
            (e0 + energy(tau) - 2.0 * r).max(0.0)
        })
        .collect()
}

/// `d'(0) = 1`, `d'(tau) = d(tau) * tau / sum_{k=1}^{tau} d(k)`.
fn cumulative_mean_normalized(diff: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(diff.len());
    out.push(1.0);
    let mut running = 0.0;
    for (tau, d) in diff.iter().enumerate().skip(1) {
        running += d;
        out.push(d * tau as f64 / (running + TINY));
    }
    out
}

/// Fractional period (in samples) within `min_period..=max_period`.
fn pick_period(cmndf: &[f64], min_period: usize, max_period: usize, threshold: f64) -> f64 {
    let range = min_period..=max_period;

    let is_trough = |tau: usize| {
        // The first lag only counts when the curve rises after it.
        if tau == min_period {
            return tau < max_period && cmndf[tau] < cmndf[tau + 1];
        }
        let falls_into = cmndf[tau] < cmndf[tau - 1];
        let rises_after = tau == max_period || cmndf[tau] <= cmndf[tau + 1];
        falls_into && rises_after
    };

    let tau = range
        .clone()
        .find(|&tau| cmndf[tau] < threshold && is_trough(tau))
        .unwrap_or_else(|| {
            // First index of the global minimum.
            range.fold(min_period, |best, tau| {
                if cmndf[tau] < cmndf[best] {
                    tau
                } else {
                    best
                }
            })
        });

    tau as f64 + parabolic_shift(cmndf, tau, min_period, max_period)
}

/// Vertex offset of the parabola through `tau - 1, tau, tau + 1`.
fn parabolic_shift(cmndf: &[f64], tau: usize, lo: usize, hi: usize) -> f64 {
    if tau <= lo || tau >= hi {
        return 0.0;
    }
    let (a, b, c) = (cmndf[tau - 1], cmndf[tau], cmndf[tau + 1]);
    let denom = a - 2.0 * b + c;
    if denom.abs() < TINY {
        return 0.0;
    }
    let shift = 0.5 * (a - c) / denom;
    if shift.abs() > 1.0 {
        0.0
    } else {
        shift
    }
}

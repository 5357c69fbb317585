//! Shared domain types.
//!
//! These types are intentionally kept lightweight so they can be:
//!
//! - used in-memory during fitting
//! - exported to JSON/CSV
//! - reloaded later for plotting

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use nalgebra::DMatrix;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::FitError;

/// Inversion times (ms) of the reference inversion-recovery turbo spin echo acquisition.
pub const DEFAULT_INVERSION_TIMES: [f64; 6] = [50.0, 100.0, 200.0, 500.0, 2000.0, 4000.0];

/// Echo times (ms) of the reference single-echo spin echo acquisition.
pub const DEFAULT_ECHO_TIMES: [f64; 6] = [10.0, 25.0, 50.0, 90.0, 150.0, 250.0];

/// Which relaxation time constant a command targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Relaxation {
    /// Longitudinal relaxation (inversion recovery).
    T1,
    /// Transverse relaxation (spin echo decay).
    T2,
}

impl Relaxation {
    pub fn label(self) -> &'static str {
        match self {
            Relaxation::T1 => "T1",
            Relaxation::T2 => "T2",
        }
    }

    /// Model used when none is requested explicitly.
    pub fn default_model(self) -> ModelKind {
        match self {
            Relaxation::T1 => ModelKind::T1Ir,
            Relaxation::T2 => ModelKind::T2Exp,
        }
    }

    pub fn default_times(self) -> TimeBase {
        match self {
            Relaxation::T1 => TimeBase(DEFAULT_INVERSION_TIMES.to_vec()),
            Relaxation::T2 => TimeBase(DEFAULT_ECHO_TIMES.to_vec()),
        }
    }

    pub fn default_data_file(self) -> &'static str {
        match self {
            Relaxation::T1 => "t1dataset.npy",
            Relaxation::T2 => "t2dataset.npy",
        }
    }
}

/// Concrete signal model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ModelKind {
    /// `m0 * (1 - 2 exp(-t/T1))`
    #[value(name = "ir")]
    T1Ir,
    /// `m0 * (1 - a exp(-t/T1))`, with the inversion factor `a` free.
    #[value(name = "ir-eff")]
    T1IrEfficiency,
    /// `m0 * exp(-t/T2)`
    #[value(name = "exp")]
    T2Exp,
    /// `m0 * exp(-t/T2) + c`, with a constant noise floor `c`.
    #[value(name = "exp-offset")]
    T2Offset,
}

impl ModelKind {
    /// Human-readable label for terminal output.
    pub fn display_name(self) -> &'static str {
        match self {
            ModelKind::T1Ir => "T1 inversion recovery",
            ModelKind::T1IrEfficiency => "T1 inversion recovery (free inversion factor)",
            ModelKind::T2Exp => "T2 mono-exponential",
            ModelKind::T2Offset => "T2 mono-exponential + offset",
        }
    }

    pub fn relaxation(self) -> Relaxation {
        match self {
            ModelKind::T1Ir | ModelKind::T1IrEfficiency => Relaxation::T1,
            ModelKind::T2Exp | ModelKind::T2Offset => Relaxation::T2,
        }
    }

    /// Inversion-recovery signals cross zero and need polarity unfolding.
    pub fn is_inversion_recovery(self) -> bool {
        self.relaxation() == Relaxation::T1
    }

    /// Number of free parameters.
    pub fn param_count(self) -> usize {
        match self {
            ModelKind::T1Ir | ModelKind::T2Exp => 2,
            ModelKind::T1IrEfficiency | ModelKind::T2Offset => 3,
        }
    }

    /// Parameter names, in vector order.
    ///
    /// The first two are always `m0` and the relaxation time.
    pub fn param_names(self) -> &'static [&'static str] {
        match self {
            ModelKind::T1Ir => &["m0", "T1"],
            ModelKind::T1IrEfficiency => &["m0", "T1", "a"],
            ModelKind::T2Exp => &["m0", "T2"],
            ModelKind::T2Offset => &["m0", "T2", "c"],
        }
    }

    /// Starting value of the third parameter when the user only supplies `(m0, T)`.
    pub fn extra_param_default(self) -> Option<f64> {
        match self {
            ModelKind::T1Ir | ModelKind::T2Exp => None,
            ModelKind::T1IrEfficiency => Some(2.0),
            ModelKind::T2Offset => Some(0.0),
        }
    }

    /// The initial guess used by the reference scripts.
    pub fn default_guess(self) -> Vec<f64> {
        let mut guess = match self.relaxation() {
            Relaxation::T1 => vec![100.0, 1000.0],
            Relaxation::T2 => vec![100.0, 100.0],
        };
        guess.extend(self.extra_param_default());
        guess
    }

    /// Check that `params` can be evaluated by this model.
    pub fn params_valid(self, params: &[f64]) -> bool {
        params.len() == self.param_count()
            && params.iter().all(|p| p.is_finite())
            && params[1] != 0.0
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Ordered acquisition times, paired positionally with a dataset's time axis.
///
/// Invariant: finite, strictly increasing, at least two entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct TimeBase(Vec<f64>);

impl TimeBase {
    pub fn new(times: Vec<f64>) -> Result<Self, FitError> {
        if times.len() < 2 {
            return Err(FitError::InvalidInput(format!(
                "time base needs at least 2 entries, got {}",
                times.len()
            )));
        }
        if times.iter().any(|t| !t.is_finite()) {
            return Err(FitError::InvalidInput("time base contains non-finite values".into()));
        }
        if times.windows(2).any(|w| w[1] <= w[0]) {
            return Err(FitError::InvalidInput("time base must be strictly increasing".into()));
        }
        Ok(Self(times))
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn first(&self) -> f64 {
        self.0[0]
    }

    pub fn last(&self) -> f64 {
        self.0[self.0.len() - 1]
    }
}

impl TryFrom<Vec<f64>> for TimeBase {
    type Error = FitError;

    fn try_from(value: Vec<f64>) -> Result<Self, Self::Error> {
        TimeBase::new(value)
    }
}

impl From<TimeBase> for Vec<f64> {
    fn from(value: TimeBase) -> Self {
        value.0
    }
}

impl FromStr for TimeBase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let values = parse_f64_list(s)?;
        TimeBase::new(values).map_err(|e| e.to_string())
    }
}

/// A pixel coordinate in the `(row, column)` plane of a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Voxel {
    pub row: usize,
    pub col: usize,
}

impl Voxel {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

impl fmt::Display for Voxel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

impl FromStr for Voxel {
    type Err = String;

    /// Parse `ROW,COL`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        let [row, col] = parts.as_slice() else {
            return Err(format!("expected ROW,COL, got '{s}'"));
        };
        let row = row
            .parse::<usize>()
            .map_err(|e| format!("invalid row '{row}': {e}"))?;
        let col = col
            .parse::<usize>()
            .map_err(|e| format!("invalid column '{col}': {e}"))?;
        Ok(Voxel { row, col })
    }
}

/// Initial parameter guess for the nonlinear fit.
#[derive(Debug, Clone, PartialEq)]
pub enum Guess {
    /// Explicit starting parameters, in `ModelKind::param_names` order.
    Fixed(Vec<f64>),
    /// Derive a starting point from the data with a relaxation-time grid search.
    Auto,
}

impl FromStr for Guess {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("auto") {
            return Ok(Guess::Auto);
        }
        let values = parse_f64_list(s)?;
        if values.len() < 2 {
            return Err(format!("guess needs at least m0 and a relaxation time, got '{s}'"));
        }
        Ok(Guess::Fixed(values))
    }
}

/// Polarity hypothesis for magnitude inversion-recovery data.
///
/// Both flip the samples before the minimum; they differ only on the minimum itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Hypothesis {
    /// Negate indices `< min_index`; the minimum stays positive.
    A,
    /// Negate indices `<= min_index`; the minimum is negative too.
    B,
}

impl Hypothesis {
    pub const BOTH: [Hypothesis; 2] = [Hypothesis::A, Hypothesis::B];

    /// Whether the minimum sample itself is negated.
    pub fn includes_minimum(self) -> bool {
        matches!(self, Hypothesis::B)
    }

    pub fn label(self) -> &'static str {
        match self {
            Hypothesis::A => "A (minimum positive)",
            Hypothesis::B => "B (minimum negative)",
        }
    }
}

/// Why the optimizer stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Termination {
    /// The residual vector is exactly zero.
    ZeroResidual,
    /// Residuals are orthogonal to the Jacobian columns.
    Gradient,
    /// Relative reduction of the sum of squares fell below tolerance.
    Function,
    /// Relative parameter step fell below tolerance.
    Step,
}

/// Fit quality diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitQuality {
    pub sse: f64,
    pub rmse: f64,
    pub n: usize,
}

/// Output of a single nonlinear least-squares fit.
#[derive(Debug, Clone)]
pub struct FitResult {
    pub model: ModelKind,
    pub params: Vec<f64>,
    /// Parameter covariance (`p x p`); `+inf` entries when it cannot be estimated.
    pub covariance: DMatrix<f64>,
    /// `sqrt(diag(covariance))`.
    pub std_errors: Vec<f64>,
    pub quality: FitQuality,
    /// Model evaluations spent by the optimizer.
    pub evaluations: usize,
    pub termination: Termination,
}

impl FitResult {
    pub fn m0(&self) -> f64 {
        self.params[0]
    }

    /// The fitted relaxation time (T1 or T2).
    pub fn relaxation_time(&self) -> f64 {
        self.params[1]
    }

    pub fn predict(&self, t: f64) -> f64 {
        crate::models::predict(self.model, t, &self.params)
    }

    /// Covariance as nested rows (for JSON export).
    pub fn covariance_rows(&self) -> Vec<Vec<f64>> {
        self.covariance
            .row_iter()
            .map(|row| row.iter().copied().collect())
            .collect()
    }
}

/// Observed vs fitted value at one acquisition time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Residual {
    pub t: f64,
    pub y_obs: f64,
    pub y_fit: f64,
    /// `y_obs - y_fit`
    pub residual: f64,
}

/// One polarity hypothesis and its fit outcome.
#[derive(Debug, Clone)]
pub struct HypothesisFit {
    pub hypothesis: Hypothesis,
    /// The series after applying the hypothesis' sign flip.
    pub signed: Vec<f64>,
    pub outcome: Result<FitResult, FitError>,
}

/// Both candidate fits of a magnitude inversion-recovery series.
///
/// No selection is made: magnitude data alone cannot tell the sign of the minimum.
#[derive(Debug, Clone)]
pub struct AmbiguousT1Fit {
    pub min_index: usize,
    pub a: HypothesisFit,
    pub b: HypothesisFit,
}

impl AmbiguousT1Fit {
    pub fn hypotheses(&self) -> [&HypothesisFit; 2] {
        [&self.a, &self.b]
    }
}

/// Which point picker a run uses when no voxel is given on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PickerKind {
    /// Full-screen image of the first time slice with a movable cursor.
    Tui,
    /// Plain text prompt for `ROW,COL`.
    Prompt,
}

/// How fits are shown after they are computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ViewerKind {
    Tui,
    Ascii,
    None,
}

/// A single-voxel run as understood by the pipeline.
///
/// This is derived from CLI flags (plus defaults).
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub data: PathBuf,
    pub model: ModelKind,
    pub times: TimeBase,
    pub guess: Guess,
    pub voxel: Option<Voxel>,
    pub picker: PickerKind,
    pub viewer: ViewerKind,
    pub plot_width: usize,
    pub plot_height: usize,
    pub export_fit: Option<PathBuf>,
    pub export_csv: Option<PathBuf>,
}

/// A whole-image parametric map run.
#[derive(Debug, Clone)]
pub struct MapConfig {
    pub data: PathBuf,
    pub out: PathBuf,
    pub model: ModelKind,
    pub times: TimeBase,
    pub guess: Guess,
    /// Voxels whose maximum magnitude is below this are skipped.
    pub threshold: f64,
}

/// Synthetic phantom generation settings.
#[derive(Debug, Clone)]
pub struct PhantomConfig {
    pub relaxation: Relaxation,
    pub out: PathBuf,
    pub rows: usize,
    pub cols: usize,
    pub times: TimeBase,
    /// Standard deviation of the additive Gaussian noise.
    pub noise: f64,
    pub seed: u64,
}

/// A saved fit file (JSON).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitFile {
    pub tool: String,
    pub generated: DateTime<Utc>,
    pub model: ModelKind,
    pub display_name: String,
    pub hypothesis: Option<Hypothesis>,
    pub voxel: Option<Voxel>,
    pub times: TimeBase,
    pub series: Vec<f64>,
    pub param_names: Vec<String>,
    pub params: Vec<f64>,
    /// JSON has no infinity: inestimable errors are written as `null`.
    #[serde(deserialize_with = "null_as_infinity")]
    pub std_errors: Vec<f64>,
    #[serde(deserialize_with = "rows_null_as_infinity")]
    pub covariance: Vec<Vec<f64>>,
    pub quality: FitQuality,
    pub grid: FitGrid,
}

fn null_as_infinity<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<f64>, D::Error> {
    let values: Vec<Option<f64>> = Vec::deserialize(d)?;
    Ok(values.into_iter().map(|v| v.unwrap_or(f64::INFINITY)).collect())
}

fn rows_null_as_infinity<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Vec<f64>>, D::Error> {
    let rows: Vec<Vec<Option<f64>>> = Vec::deserialize(d)?;
    Ok(rows
        .into_iter()
        .map(|row| row.into_iter().map(|v| v.unwrap_or(f64::INFINITY)).collect())
        .collect())
}

/// The fitted curve sampled on an even grid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitGrid {
    pub t: Vec<f64>,
    pub y: Vec<f64>,
}

fn parse_f64_list(s: &str) -> Result<Vec<f64>, String> {
    s.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<f64>()
                .map_err(|e| format!("invalid number '{part}': {e}"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_base_rejects_unordered_and_short() {
        assert!(TimeBase::new(vec![10.0]).is_err());
        assert!(TimeBase::new(vec![10.0, 10.0]).is_err());
        assert!(TimeBase::new(vec![10.0, 5.0, 20.0]).is_err());
        assert!(TimeBase::new(vec![10.0, f64::NAN]).is_err());
        assert_eq!(TimeBase::new(vec![1.0, 2.0]).unwrap().len(), 2);
    }

    #[test]
    fn time_base_parses_comma_list() {
        let tb: TimeBase = "50, 100,200".parse().unwrap();
        assert_eq!(tb.as_slice(), &[50.0, 100.0, 200.0]);
        assert!("50,abc".parse::<TimeBase>().is_err());
    }

    #[test]
    fn voxel_parses_row_col() {
        assert_eq!("3,7".parse::<Voxel>().unwrap(), Voxel::new(3, 7));
        assert_eq!(" 12 , 0 ".parse::<Voxel>().unwrap(), Voxel::new(12, 0));
        assert!("3".parse::<Voxel>().is_err());
        assert!("3,-1".parse::<Voxel>().is_err());
    }

    #[test]
    fn guess_parses_auto_and_values() {
        assert_eq!("auto".parse::<Guess>().unwrap(), Guess::Auto);
        assert_eq!(
            "100,1000".parse::<Guess>().unwrap(),
            Guess::Fixed(vec![100.0, 1000.0])
        );
        assert!("100".parse::<Guess>().is_err());
    }

    #[test]
    fn default_guesses_match_param_counts() {
        for model in [
            ModelKind::T1Ir,
            ModelKind::T1IrEfficiency,
            ModelKind::T2Exp,
            ModelKind::T2Offset,
        ] {
            assert_eq!(model.default_guess().len(), model.param_count());
            assert_eq!(model.param_names().len(), model.param_count());
        }
        assert_eq!(ModelKind::T1Ir.default_guess(), vec![100.0, 1000.0]);
        assert_eq!(ModelKind::T2Exp.default_guess(), vec![100.0, 100.0]);
    }

    #[test]
    fn time_base_serializes_as_plain_list() {
        let tb = TimeBase::new(vec![1.0, 2.5]).unwrap();
        let json = serde_json::to_string(&tb).unwrap();
        assert_eq!(json, "[1.0,2.5]");
        assert!(serde_json::from_str::<TimeBase>("[2.0,1.0]").is_err());
    }
}

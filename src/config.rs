use crate::error::{Result, SkewError};
use crate::models::AxisField;
use crate::utils::plotting::ChartDimensions;
use dotenv::dotenv;
use std::env;
use std::path::PathBuf;

/// Configuration for the application
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Log level
    pub log_level: String,
    /// Option chain document (`{"C": [...], "P": [...]}`)
    pub chain_path: PathBuf,
    /// Optional SVI curve query document
    pub curve_path: Option<PathBuf>,
    /// Directory for chart and Parquet output
    pub output_dir: PathBuf,
    /// Quantity on the chart x axis
    pub x_axis: AxisField,
    /// Cursor x position, in pixels, to resolve a tooltip for
    pub cursor_x: Option<f64>,
    pub plot_width: u32,
    pub plot_height: u32,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if it exists
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from any key/value source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let chain_path = lookup("VOLSKEW_CHAIN_PATH").map(PathBuf::from).ok_or_else(|| {
            SkewError::ConfigError("VOLSKEW_CHAIN_PATH environment variable not set".to_string())
        })?;

        let log_level = lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string());
        let curve_path = lookup("VOLSKEW_CURVE_PATH").map(PathBuf::from);
        let output_dir = lookup("VOLSKEW_OUTPUT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("output"));

        let x_axis = match lookup("VOLSKEW_X_AXIS") {
            Some(value) => value.parse::<AxisField>().map_err(SkewError::ConfigError)?,
            None => AxisField::default(),
        };

        let cursor_x = lookup("VOLSKEW_CURSOR_X")
            .map(|v| parse_var::<f64>("VOLSKEW_CURSOR_X", &v))
            .transpose()?;

        let plot_width = match lookup("VOLSKEW_PLOT_WIDTH") {
            Some(v) => parse_var("VOLSKEW_PLOT_WIDTH", &v)?,
            None => 1024,
        };
        let plot_height = match lookup("VOLSKEW_PLOT_HEIGHT") {
            Some(v) => parse_var("VOLSKEW_PLOT_HEIGHT", &v)?,
            None => 768,
        };

        Ok(Config {
            log_level,
            chain_path,
            curve_path,
            output_dir,
            x_axis,
            cursor_x,
            plot_width,
            plot_height,
        })
    }

    pub fn dimensions(&self) -> ChartDimensions {
        ChartDimensions::with_size(self.plot_width, self.plot_height)
    }

    /// Initialize logging based on configuration
    pub fn init_logging(&self) -> Result<()> {
        use tracing_subscriber::{fmt, EnvFilter};

        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&self.log_level));

        fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init()
            .map_err(|e| SkewError::ConfigError(format!("Failed to initialize logging: {}", e)))
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| SkewError::ConfigError(format!("{} has an invalid value: '{}'", key, value)))
}

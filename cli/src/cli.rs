use clap::Parser;
use clap::ValueEnum;

/// Headless driver for one `appforge-core` session: no interactive UI,
/// just a query in and the event stream printed as it arrives.
#[derive(Parser, Debug)]
#[command(version, about = "Drive one AppForge generation session end-to-end")]
pub struct Cli {
    /// Natural-language application request.
    pub query: String,

    /// Seed template to bootstrap from.
    #[arg(long, default_value = "vanilla-react")]
    pub template: String,

    /// Directory the local sandbox writes generated files under. Defaults
    /// to a fresh temporary directory.
    #[arg(long)]
    pub workdir: Option<std::path::PathBuf>,

    /// Stop after the phase loop finishes instead of also requesting a
    /// preview deploy.
    #[arg(long, default_value_t = false)]
    pub skip_deploy: bool,

    /// Specifies color settings for use in the output.
    #[arg(long = "color", value_enum, default_value_t = Color::Auto)]
    pub color: Color,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "kebab-case")]
pub enum Color {
    Always,
    Never,
    #[default]
    Auto,
}

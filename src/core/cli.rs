use clap::{Parser, command};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Application configuration (.yaml, .yml, .toml or .json)
    #[arg(short, long)]
    pub configuration_path: Option<String>,

    /// Compile the rewrite rules, print the engine status and exit
    #[arg(long)]
    pub check: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arguments() {
        let cli = Cli::parse_from(["rewrite-hub", "-c", "hub.toml", "--check"]);
        assert_eq!(cli.configuration_path.as_deref(), Some("hub.toml"));
        assert!(cli.check);

        let cli = Cli::parse_from(["rewrite-hub"]);
        assert_eq!(cli.configuration_path, None);
        assert!(!cli.check);
    }
}

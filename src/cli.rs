use crate::search::{MatchStrategy, SearchDomain};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
pub struct Cli {
    /// JSON drawing snapshot standing in for the CAD host
    #[clap(long, value_parser)]
    pub snapshot: PathBuf,

    /// Drawing to work on instead of the snapshot's active one
    #[clap(long, value_parser)]
    pub drawing: Option<String>,

    #[clap(long, value_parser)]
    pub config: Option<PathBuf>,

    #[clap(long, value_parser, default_value_t = false)]
    pub verbose: bool,

    #[clap(long, value_parser)]
    pub log: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Search {
        term: String,

        #[clap(long, value_enum)]
        domain: Option<SearchDomain>,

        #[clap(long, value_parser, default_value_t = false)]
        wildcard: bool,

        #[clap(long, value_parser, default_value_t = false)]
        case_sensitive: bool,

        #[clap(long, value_parser, default_value_t = false)]
        show_all_parts: bool,

        /// Match strategies to combine; any one matching is enough
        #[clap(long = "strategy", value_enum)]
        strategies: Vec<MatchStrategy>,

        /// Print the metrics registry after searching
        #[clap(long, value_parser, default_value_t = false)]
        metrics: bool,
    },
    /// Dump the cache keys of the drawing
    Keys {
        #[clap(long, value_parser, default_value_t = false)]
        relationships: bool,
    },
    /// List the assembly positions indexed for the drawing
    Positions,
}

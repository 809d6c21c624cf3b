use clap::{Args, Subcommand};

#[derive(Subcommand)]
pub enum Commands {
    /// Navigate a generated in-memory table
    Demo {
        #[arg(long, default_value_t = 100, help = "Number of rows in the table")]
        rows: usize,

        #[command(flatten)]
        nav: NavArgs,
    },
    /// Navigate the result of a Postgres query
    Pg {
        #[arg(long, help = "Postgres connection URL")]
        url: String,

        #[arg(long, help = "Query whose result is navigated")]
        query: String,

        #[arg(long, help = "Count rows up front so the last row is known")]
        count: bool,

        #[command(flatten)]
        nav: NavArgs,
    },
    /// Stream every row of a generated table forward-only with prefetch
    Stream {
        #[arg(long, default_value_t = 1000)]
        rows: usize,

        #[arg(long, help = "Rows per batch request")]
        fetch_size: Option<usize>,

        #[arg(
            long,
            default_value_t = 10,
            help = "Remaining buffered rows that trigger the next fetch"
        )]
        prefetch: usize,

        #[arg(long, help = "Simulated latency per fetch in milliseconds")]
        latency_ms: Option<u64>,
    },
}

#[derive(Args)]
pub struct NavArgs {
    #[arg(long, help = "Rows per batch request")]
    pub fetch_size: Option<usize>,

    #[arg(long, help = "Reject backward and jump navigation")]
    pub forward_only: bool,

    #[arg(
        long,
        default_value = "next,next,last,prev,abs 5,rel -2,first",
        help = "Comma-separated steps: next, prev, first, last, abs N, rel N, before, after"
    )]
    pub script: String,
}

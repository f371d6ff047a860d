use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "tubedrop")]
#[command(author, version, about = "Search YouTube and download MP3s with live progress", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the web server (default)
    Serve {
        /// Port to listen on (overrides WEB_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Search YouTube and print the results
    Search {
        /// Search terms
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,

        /// Print the raw JSON response
        #[arg(long)]
        json: bool,
    },

    /// Download one video as MP3, printing progress
    Download {
        /// YouTube URL (youtube.com or youtu.be)
        url: String,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_subcommand_defaults_to_none() {
        let cli = Cli::try_parse_from(["tubedrop"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_serve_port() {
        let cli = Cli::try_parse_from(["tubedrop", "serve", "--port", "8080"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Serve { port: Some(8080) })));
    }

    #[test]
    fn test_search_joins_words() {
        let cli = Cli::try_parse_from(["tubedrop", "search", "lofi", "hip", "hop", "--json"]).unwrap();
        match cli.command {
            Some(Commands::Search { query, json }) => {
                assert_eq!(query.join(" "), "lofi hip hop");
                assert!(json);
            }
            _ => panic!("expected search"),
        }
    }

    #[test]
    fn test_search_requires_query() {
        assert!(Cli::try_parse_from(["tubedrop", "search"]).is_err());
    }

    #[test]
    fn test_download_url() {
        let cli = Cli::try_parse_from(["tubedrop", "download", "https://youtu.be/abc"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Download { ref url }) if url == "https://youtu.be/abc"));
    }
}

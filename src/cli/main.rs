use clap::{Parser, Subcommand};
use reqwest::{Client, RequestBuilder};
use serde_json::{json, Value};
use std::error::Error;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "book-catalog-cli")]
#[command(about = "Book Catalog CLI", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    endpoint: String,

    /// Sent as X-Username
    #[arg(short, long, env = "BOOK_CATALOG_USER")]
    user: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check server health
    Health,

    /// Add a book
    Add {
        #[arg(short, long)]
        title: String,

        #[arg(short, long)]
        author: String,

        #[arg(short, long)]
        price: f64,

        /// YYYY-MM-DD
        #[arg(short = 'd', long)]
        publish_date: String,

        #[arg(short, long)]
        ebook: bool,
    },

    /// Get book details
    Get {
        #[arg(value_name = "BOOK_ID")]
        id: String,
    },

    /// Change a book's title
    Update {
        #[arg(value_name = "BOOK_ID")]
        id: String,

        #[arg(short, long)]
        title: String,
    },

    /// Delete a book
    Delete {
        #[arg(value_name = "BOOK_ID")]
        id: String,
    },

    /// Search books
    Search {
        #[arg(short, long)]
        title: Option<String>,

        #[arg(short, long)]
        author: Option<String>,

        #[arg(long)]
        min_price: Option<f64>,

        #[arg(long)]
        max_price: Option<f64>,

        #[arg(short, long, default_value = "10")]
        size: usize,

        #[arg(short, long, default_value = "0")]
        from: usize,
    },

    /// Catalog statistics
    Stats,

    /// Your recent requests
    Activity,

    /// Add every book from a JSON array file
    Seed {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

struct Api {
    client: Client,
    endpoint: String,
    user: Option<String>,
}

impl Api {
    fn request(&self, method: reqwest::Method, path: &str) -> RequestBuilder {
        let builder = self
            .client
            .request(method, format!("{}{}", self.endpoint.trim_end_matches('/'), path));
        match &self.user {
            Some(user) => builder.header("X-Username", user),
            None => builder,
        }
    }

    async fn print(&self, request: RequestBuilder) -> Result<(), Box<dyn Error>> {
        let response = request.send().await?;
        let status = response.status();
        let body: Value = response.json().await.unwrap_or(Value::Null);

        if !status.is_success() {
            eprintln!("Request failed with status {}", status);
        }
        println!("{}", serde_json::to_string_pretty(&body)?);
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let api = Api {
        client: Client::new(),
        endpoint: cli.endpoint,
        user: cli.user,
    };

    use reqwest::Method;

    match cli.command {
        Commands::Health => api.print(api.request(Method::GET, "/")).await?,

        Commands::Add {
            title,
            author,
            price,
            publish_date,
            ebook,
        } => {
            let request = api.request(Method::POST, "/v1/books").json(&json!({
                "title": title,
                "author_name": author,
                "price": price,
                "ebook_available": ebook,
                "publish_date": publish_date,
            }));
            api.print(request).await?
        }

        Commands::Get { id } => {
            api.print(api.request(Method::GET, &format!("/v1/books/{}", id)))
                .await?
        }

        Commands::Update { id, title } => {
            let request = api
                .request(Method::PUT, &format!("/v1/books/{}", id))
                .json(&json!({ "title": title }));
            api.print(request).await?
        }

        Commands::Delete { id } => {
            api.print(api.request(Method::DELETE, &format!("/v1/books/{}", id)))
                .await?
        }

        Commands::Search {
            title,
            author,
            min_price,
            max_price,
            size,
            from,
        } => {
            let mut criteria = json!({ "title": title, "author_name": author });
            if min_price.is_some() || max_price.is_some() {
                criteria["price_range"] = json!({
                    "min": min_price.unwrap_or(0.0),
                    "max": max_price.unwrap_or(0.0),
                });
            }

            let request = api
                .request(
                    Method::GET,
                    &format!("/v1/books/search?size={}&from={}", size, from),
                )
                .json(&criteria);
            api.print(request).await?
        }

        Commands::Stats => api.print(api.request(Method::GET, "/store")).await?,

        Commands::Activity => api.print(api.request(Method::GET, "/activity")).await?,

        Commands::Seed { file } => {
            let raw = std::fs::read_to_string(&file)?;
            let books: Vec<Value> = serde_json::from_str(&raw)?;

            let mut accepted = 0usize;
            for book in &books {
                let response = api.request(Method::POST, "/v1/books").json(book).send().await?;
                if response.status().is_success() {
                    accepted += 1;
                } else {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    eprintln!("Rejected {}: {} {}", book["title"], status, body);
                }
            }

            println!("Seeded {}/{} books", accepted, books.len());
        }
    }

    Ok(())
}

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use facereg_core::{Descriptor, DescriptorExtractor, ImageSource, OnnxExtractor};
use serde_json::{json, Value};

mod client;

use client::Client;

#[derive(Parser)]
#[command(name = "facereg", version, about = "facereg identity registry CLI")]
struct Cli {
    /// Base URL of the faceregd server
    #[arg(long, env = "FACEREG_URL", default_value = "http://127.0.0.1:8000")]
    server: String,

    /// Request timeout in seconds
    #[arg(long, default_value_t = 30)]
    timeout: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a new identity from one or more face images
    Create {
        /// Name of the person
        #[arg(short, long)]
        name: String,
        /// Face images; several images are averaged into one descriptor
        #[arg(required = true)]
        images: Vec<PathBuf>,
    },
    /// Delete an identity by id
    Delete {
        /// Identity id returned by `create`
        id: String,
    },
    /// Find the best matching identity for a face
    Search { image: PathBuf },
    /// Locate and match every face in an image
    Detect { image: PathBuf },
    /// List registered identities
    List {
        /// Print descriptors as well
        #[arg(long)]
        descriptors: bool,
    },
    /// Show server status
    Status,
    /// Compute a descriptor locally, without a server
    Encode {
        /// Face image(s) or a directory of images
        #[arg(required = true)]
        images: Vec<PathBuf>,
        /// Directory containing the ONNX models
        #[arg(long, env = "FACEREG_MODEL_DIR")]
        model_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    // The client does not connect until a request is made.
    let client = Client::new(&cli.server, Duration::from_secs(cli.timeout))?;

    match cli.command {
        Commands::Create { name, images } => {
            let record = client.create(&name, &images).await?;
            println!(
                "Created identity {} ({})",
                record["identity_id"].as_str().unwrap_or("?"),
                record["name"].as_str().unwrap_or(&name)
            );
        }
        Commands::Delete { id } => {
            let body = client.delete(&id).await?;
            println!("{}", body["message"].as_str().unwrap_or("deleted"));
        }
        Commands::Search { image } => {
            let body = client.search(&image).await?;
            match body.get("identity_id").and_then(Value::as_str) {
                Some(id) => println!(
                    "{} ({id}) score {:.4}",
                    body["name"].as_str().unwrap_or("Unknown"),
                    body["score"].as_f64().unwrap_or(0.0)
                ),
                None => println!("No match"),
            }
        }
        Commands::Detect { image } => {
            let body = client.detect(&image).await?;
            match body.get("faces").and_then(Value::as_array) {
                Some(faces) => {
                    for face in faces {
                        println!(
                            "[top {} right {} bottom {} left {}] {} score {:.4}",
                            face["top"],
                            face["right"],
                            face["bottom"],
                            face["left"],
                            face["name"].as_str().unwrap_or("Unknown"),
                            face["score"].as_f64().unwrap_or(0.0)
                        );
                    }
                }
                None => println!("No face detected"),
            }
        }
        Commands::List { descriptors } => {
            let body = client.list().await?;
            let identities = body.as_array().cloned().unwrap_or_default();
            if identities.is_empty() {
                println!("No identities registered");
            } else if descriptors {
                print_json(&body)?;
            } else {
                println!("{:<38} NAME", "ID");
                for identity in &identities {
                    println!(
                        "{:<38} {}",
                        identity["identity_id"].as_str().unwrap_or("?"),
                        identity["name"].as_str().unwrap_or("Unknown")
                    );
                }
            }
        }
        Commands::Status => {
            print_json(&client.status().await?)?;
        }
        Commands::Encode { images, model_dir } => {
            let model_dir = model_dir.unwrap_or_else(facereg_core::default_model_dir);
            let descriptor = encode_local(&images, &model_dir)?;
            print_json(&json!({
                "dimension": descriptor.len(),
                "descriptor": descriptor,
            }))?;
        }
    }

    Ok(())
}

/// Run the ONNX extractor in-process. Several paths are averaged like a
/// directory upload.
fn encode_local(images: &[PathBuf], model_dir: &std::path::Path) -> Result<Descriptor> {
    let detector = model_dir.join(facereg_core::DETECTOR_MODEL_FILE);
    let recognizer = model_dir.join(facereg_core::RECOGNIZER_MODEL_FILE);
    let mut extractor = OnnxExtractor::load(
        &detector.to_string_lossy(),
        &recognizer.to_string_lossy(),
    )
    .with_context(|| format!("loading models from {}", model_dir.display()))?;
    tracing::debug!(dimension = extractor.dimension(), "extractor loaded");

    let mut samples = Vec::with_capacity(images.len());
    for path in images {
        let descriptor = facereg_core::encode_source(&mut extractor, &ImageSource::Path(path.clone()))
            .with_context(|| format!("encoding {}", path.display()))?;
        samples.push(descriptor);
    }
    Descriptor::mean(&samples).context("no descriptors to average")
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

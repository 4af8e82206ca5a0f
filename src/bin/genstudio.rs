//! CLI for GenStudio - text-to-image generation.

use async_trait::async_trait;
use clap::{Args, Parser, Subcommand, ValueEnum};
use genstudio::image::providers::{GeminiProvider, BASE_URL_ENV_VAR};
use genstudio::session::view;
use genstudio::{
    AspectRatio, CredentialHost, ImageModel, ImageProvider, ImageSize, KeySlot, StudioController,
    SubmitOutcome,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "genstudio")]
#[command(about = "Generate images from text prompts with Gemini image models")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Gemini API key
    #[arg(long, global = true, env = "GEMINI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Override the API endpoint
    #[arg(long, global = true, env = BASE_URL_ENV_VAR)]
    base_url: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a single image from a text prompt
    Generate(GenerateArgs),

    /// Start an interactive studio session
    Studio(StudioArgs),

    /// List available models
    Models,

    /// Check that the API key is accepted
    Check {
        /// Model to check
        #[arg(short, long, value_enum, default_value = "flash")]
        model: ModelArg,
    },
}

#[derive(Args)]
struct GenerateArgs {
    /// The text prompt describing the image
    prompt: String,

    /// Elements to exclude from the image
    #[arg(short, long)]
    negative: Option<String>,

    /// Aspect ratio
    #[arg(long, value_enum, default_value = "1:1")]
    aspect_ratio: AspectRatioArg,

    /// Model to use
    #[arg(short, long, value_enum, default_value = "flash")]
    model: ModelArg,

    /// Output size (pro model only)
    #[arg(short, long, value_enum)]
    size: Option<SizeArg>,

    /// Output file path (defaults to the download name in the current directory)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Args)]
struct StudioArgs {
    /// Directory images are saved into
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModelArg {
    Flash,
    Pro,
}

impl From<ModelArg> for ImageModel {
    fn from(arg: ModelArg) -> Self {
        match arg {
            ModelArg::Flash => ImageModel::Flash,
            ModelArg::Pro => ImageModel::Pro,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum AspectRatioArg {
    #[value(name = "1:1")]
    Square,
    #[value(name = "4:3")]
    Standard,
    #[value(name = "3:4")]
    StandardPortrait,
    #[value(name = "16:9")]
    Landscape,
    #[value(name = "9:16")]
    Portrait,
}

impl From<AspectRatioArg> for AspectRatio {
    fn from(arg: AspectRatioArg) -> Self {
        match arg {
            AspectRatioArg::Square => AspectRatio::Square,
            AspectRatioArg::Standard => AspectRatio::Standard,
            AspectRatioArg::StandardPortrait => AspectRatio::StandardPortrait,
            AspectRatioArg::Landscape => AspectRatio::Landscape,
            AspectRatioArg::Portrait => AspectRatio::Portrait,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SizeArg {
    #[value(name = "1K")]
    OneK,
    #[value(name = "2K")]
    TwoK,
    #[value(name = "4K")]
    FourK,
}

impl From<SizeArg> for ImageSize {
    fn from(arg: SizeArg) -> Self {
        match arg {
            SizeArg::OneK => ImageSize::OneK,
            SizeArg::TwoK => ImageSize::TwoK,
            SizeArg::FourK => ImageSize::FourK,
        }
    }
}

type SharedStdin = Arc<Mutex<Lines<BufReader<Stdin>>>>;

/// Asks for a key on the terminal and stores it in the provider's slot.
struct TerminalKeyPicker {
    slot: KeySlot,
    stdin: SharedStdin,
}

#[async_trait]
impl CredentialHost for TerminalKeyPicker {
    async fn has_selected_key(&self) -> bool {
        self.slot.is_set()
    }

    async fn open_key_selection(&self) {
        eprintln!("Select an API key (paid key required for Gemini 3 Pro).");
        eprintln!("Billing info: https://ai.google.dev/gemini-api/docs/billing");
        eprint!("API key (empty to cancel): ");
        let line = self.stdin.lock().await.next_line().await;
        match line {
            Ok(Some(key)) if !key.trim().is_empty() => {
                self.slot.set(key);
                eprintln!("API key updated.");
            }
            Ok(_) => eprintln!("Key selection cancelled."),
            Err(e) => tracing::warn!("failed to read API key: {e}"),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let slot = KeySlot::new(cli.api_key.clone());
    if !slot.is_set() {
        // Fall back to the remaining key variables.
        if let Some(key) = KeySlot::from_env().get() {
            slot.set(key);
        }
    }

    match cli.command {
        Commands::Generate(args) => {
            let provider = build_provider(&slot, cli.base_url.as_deref())?;
            generate(provider, args, cli.json).await?;
        }
        Commands::Studio(args) => {
            let provider = build_provider(&slot, cli.base_url.as_deref())?;
            run_studio(provider, slot, args).await?;
        }
        Commands::Models => {
            list_models(cli.json)?;
        }
        Commands::Check { model } => {
            let provider = build_provider(&slot, cli.base_url.as_deref())?;
            provider.health_check(model.into()).await?;
            println!("{} is reachable and the API key is accepted", ImageModel::from(model));
        }
    }

    Ok(())
}

fn build_provider(slot: &KeySlot, base_url: Option<&str>) -> anyhow::Result<GeminiProvider> {
    let mut builder = GeminiProvider::builder().key_slot(slot.clone());
    if let Some(url) = base_url {
        builder = builder.base_url(url);
    }
    Ok(builder.build()?)
}

fn shared_stdin() -> SharedStdin {
    Arc::new(Mutex::new(BufReader::new(tokio::io::stdin()).lines()))
}

/// Submits and prints progress labels to stderr while waiting.
async fn submit_with_progress<P, C>(controller: &mut StudioController<P, C>) -> SubmitOutcome
where
    P: ImageProvider,
    C: CredentialHost,
{
    let mut updates = controller.status_updates();
    let printer = tokio::spawn(async move {
        while updates.changed().await.is_ok() {
            let status = *updates.borrow_and_update();
            if let Some(status) = status {
                eprintln!("{}", view::render_status(status));
            }
        }
    });

    let outcome = controller.submit().await;
    printer.abort();
    outcome
}

/// One-shot generation. The key comes only from flags or the environment;
/// there is no later request that a key typed at a prompt could serve.
async fn generate<P: ImageProvider>(
    provider: P,
    args: GenerateArgs,
    json_output: bool,
) -> anyhow::Result<()> {
    let model = ImageModel::from(args.model);
    if args.size.is_some() && !model.supports_image_size() {
        anyhow::bail!("--size is only supported by the pro model");
    }

    let mut controller = StudioController::new(provider);
    let form = controller.form_mut();
    form.prompt = args.prompt;
    form.negative_prompt = args.negative.unwrap_or_default();
    form.aspect_ratio = args.aspect_ratio.into();
    form.model = model;
    if let Some(size) = args.size {
        form.image_size = size.into();
    }

    if !controller.can_submit() {
        anyhow::bail!("prompt is empty");
    }

    match submit_with_progress(&mut controller).await {
        SubmitOutcome::Succeeded(_) => {}
        SubmitOutcome::Failed(err) => {
            let message = controller.error().unwrap_or(err.user_message());
            if err.requires_key_selection() {
                anyhow::bail!("{message} ({err}). Set GEMINI_API_KEY or pass --api-key.");
            }
            anyhow::bail!("{message} ({err})");
        }
        SubmitOutcome::Skipped => anyhow::bail!("prompt is empty"),
    }

    let media = controller
        .current()
        .ok_or_else(|| anyhow::anyhow!("generated image missing from history"))?;
    let output = args
        .output
        .unwrap_or_else(|| PathBuf::from(media.download_file_name()));
    media.save(&output)?;

    if json_output {
        let result = serde_json::json!({
            "type": "image",
            "success": true,
            "id": media.id,
            "output": output.display().to_string(),
            "prompt": media.prompt,
            "negativePrompt": media.negative_prompt,
            "aspectRatio": media.aspect_ratio,
            "model": media.model,
            "timestamp": media.timestamp,
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("Generated image: {}", output.display());
        print!("{}", view::render_media(media));
    }

    Ok(())
}

/// One line of studio input.
#[derive(Debug, PartialEq)]
enum StudioCommand {
    Prompt(String),
    Generate,
    Model(String),
    Ratio(String),
    Size(String),
    Negative(String),
    History,
    Show(usize),
    Save(Option<usize>),
    Settings,
    Help,
    Quit,
    Unknown(String),
}

fn parse_command(line: &str) -> StudioCommand {
    let line = line.trim();
    let Some(rest) = line.strip_prefix(':') else {
        return StudioCommand::Prompt(line.to_string());
    };

    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };

    match name {
        "g" | "generate" => StudioCommand::Generate,
        "model" => StudioCommand::Model(arg.to_string()),
        "ratio" => StudioCommand::Ratio(arg.to_string()),
        "size" => StudioCommand::Size(arg.to_string()),
        "negative" | "neg" => StudioCommand::Negative(arg.to_string()),
        "history" | "h" => StudioCommand::History,
        "show" => match arg.parse() {
            Ok(position) => StudioCommand::Show(position),
            Err(_) => StudioCommand::Unknown(line.to_string()),
        },
        "save" => {
            if arg.is_empty() {
                StudioCommand::Save(None)
            } else {
                match arg.parse() {
                    Ok(position) => StudioCommand::Save(Some(position)),
                    Err(_) => StudioCommand::Unknown(line.to_string()),
                }
            }
        }
        "settings" | "s" => StudioCommand::Settings,
        "help" | "?" => StudioCommand::Help,
        "quit" | "q" | "exit" => StudioCommand::Quit,
        _ => StudioCommand::Unknown(line.to_string()),
    }
}

const STUDIO_HELP: &str = "\
Type a prompt and press enter to generate.
  :g                 generate again with the current prompt
  :model flash|pro   choose the engine
  :ratio R           1:1, 4:3, 3:4, 16:9, 9:16
  :size 1K|2K|4K     output quality (pro only)
  :negative TEXT     exclusions (empty to clear)
  :history           list creations
  :show N            display creation N
  :save [N]          save the displayed creation (or N)
  :settings          show current settings
  :quit              leave the studio";

async fn run_studio(provider: GeminiProvider, slot: KeySlot, args: StudioArgs) -> anyhow::Result<()> {
    std::fs::create_dir_all(&args.output_dir)?;

    let stdin = shared_stdin();
    let picker = TerminalKeyPicker {
        slot,
        stdin: Arc::clone(&stdin),
    };
    let mut controller = StudioController::with_credentials(provider, picker);

    println!("GenStudio - {} ready. Type :help for commands.", controller.form().model.label());

    loop {
        eprint!("> ");
        let line = stdin.lock().await.next_line().await?;
        let Some(line) = line else { break };
        if line.trim().is_empty() {
            continue;
        }

        match parse_command(&line) {
            StudioCommand::Prompt(prompt) => {
                controller.form_mut().prompt = prompt;
                studio_submit(&mut controller).await;
            }
            StudioCommand::Generate => studio_submit(&mut controller).await,
            StudioCommand::Model(arg) => match arg.parse::<ImageModel>() {
                Ok(model) => {
                    controller.form_mut().model = model;
                    print!("{}", view::render_form(controller.form()));
                }
                Err(e) => eprintln!("{e}"),
            },
            StudioCommand::Ratio(arg) => match arg.parse::<AspectRatio>() {
                Ok(ratio) => controller.form_mut().aspect_ratio = ratio,
                Err(e) => eprintln!("{e}"),
            },
            StudioCommand::Size(arg) => match arg.parse::<ImageSize>() {
                Ok(size) => {
                    controller.form_mut().image_size = size;
                    if !controller.form().model.supports_image_size() {
                        eprintln!("note: size applies only when the pro model is selected");
                    }
                }
                Err(e) => eprintln!("{e}"),
            },
            StudioCommand::Negative(text) => controller.form_mut().negative_prompt = text,
            StudioCommand::History => print!("{}", view::render_history(controller.history())),
            StudioCommand::Show(position) => match controller.select_position(position) {
                Some(media) => print!("{}", view::render_media(media)),
                None => eprintln!("no creation at position {position}"),
            },
            StudioCommand::Save(position) => {
                let media = match position {
                    Some(position) => controller.history().at_position(position),
                    None => controller.current(),
                };
                match media {
                    Some(media) => match media.download_to(&args.output_dir) {
                        Ok(path) => println!("Saved {}", path.display()),
                        Err(e) => eprintln!("save failed: {e}"),
                    },
                    None => eprintln!("nothing to save"),
                }
            }
            StudioCommand::Settings => print!("{}", view::render_session(&controller)),
            StudioCommand::Help => println!("{STUDIO_HELP}"),
            StudioCommand::Quit => break,
            StudioCommand::Unknown(input) => eprintln!("unknown command: {input} (try :help)"),
        }
    }

    println!(
        "Session ended with {} creation(s).",
        controller.history().len()
    );
    Ok(())
}

async fn studio_submit<P, C>(controller: &mut StudioController<P, C>)
where
    P: ImageProvider,
    C: CredentialHost,
{
    if !controller.can_submit() {
        eprintln!("enter a prompt first");
        return;
    }
    match submit_with_progress(controller).await {
        SubmitOutcome::Succeeded(_) => {
            if let Some(media) = controller.current() {
                print!("{}", view::render_media(media));
            }
        }
        SubmitOutcome::Failed(_) => {
            if let Some(error) = controller.error() {
                eprintln!("error: {error}");
            }
        }
        SubmitOutcome::Skipped => {}
    }
}

fn list_models(json_output: bool) -> anyhow::Result<()> {
    #[derive(serde::Serialize)]
    struct ModelInfo {
        name: &'static str,
        id: &'static str,
        image_sizes: Vec<&'static str>,
        key_preflight: bool,
    }

    let models: Vec<_> = ImageModel::ALL
        .into_iter()
        .map(|model| ModelInfo {
            name: model.label(),
            id: model.as_str(),
            image_sizes: if model.supports_image_size() {
                ImageSize::ALL.iter().map(|s| s.as_str()).collect()
            } else {
                Vec::new()
            },
            key_preflight: model.is_high_quality(),
        })
        .collect();

    if json_output {
        println!("{}", serde_json::to_string_pretty(&models)?);
    } else {
        println!("Available models:\n");
        for m in &models {
            println!("  {} ({})", m.name, m.id);
            if !m.image_sizes.is_empty() {
                println!("    sizes: {}", m.image_sizes.join(", "));
            }
        }
        let ratios: Vec<_> = AspectRatio::ALL.iter().map(|r| r.as_str()).collect();
        println!("\nAspect ratios: {}", ratios.join(", "));
        println!("API key: GEMINI_API_KEY (or API_KEY)");
    }

    Ok(())
}

use crate::auth::{AuthError, TokenAuthority};
use crate::server;
use clap::{Args, Parser, Subcommand};
use listing_hub::config::AppConfig;
use listing_hub::domain::{Caller, Role, UserId};
use listing_hub::error::AppError;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(
    name = "Listing Hub",
    about = "Serve moderated flat listings and subscriber notifications",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service and notification dispatcher (default command)
    Serve(ServeArgs),
    /// Print a bearer token signed with the configured secret
    Token(TokenArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

#[derive(Args, Debug)]
pub(crate) struct TokenArgs {
    /// Role embedded in the token (client or moderator)
    #[arg(long)]
    pub(crate) role: Role,
    /// Reuse an existing user id instead of generating one
    #[arg(long)]
    pub(crate) user_id: Option<Uuid>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Token(args) => print_token(args),
    }
}

fn print_token(args: TokenArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let authority = TokenAuthority::new(&config.auth.secret, config.auth.token_ttl);
    let user_id = args.user_id.map(UserId).unwrap_or_else(UserId::new_random);

    let token = authority
        .issue(&Caller::new(user_id, args.role))
        .map_err(signing_error)?;
    println!("{token}");
    Ok(())
}

fn signing_error(err: AuthError) -> AppError {
    AppError::Signing(Box::new(err))
}

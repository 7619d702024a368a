use clap::{Parser, Subcommand};
use ims_oauth_lib::{
    ims_login, load_config, login, AppResult, FlowDeps, HttpImsClient, ImsEnvironment, LoginDeps,
    LoginOptions, DEFAULT_LOGIN_TIMEOUT,
};
use std::path::PathBuf;
use std::process;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "ims-oauth", about = "Interactive IMS OAuth2 login", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log debug output to stderr (IMS_OAUTH_LOG overrides)
    #[arg(long, short = 'v', global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in through the browser and print the credential as JSON
    Login {
        /// IMS environment (prod|stage); defaults to IMS_OAUTH_ENV, then prod
        #[arg(long)]
        env: Option<String>,

        #[arg(long)]
        client_id: Option<String>,

        #[arg(long)]
        scope: Option<String>,

        #[arg(long)]
        redirect_uri: Option<String>,

        /// Callback listener port (default: any free port)
        #[arg(long)]
        port: Option<u16>,

        /// Seconds to wait for the login to complete
        #[arg(long, default_value_t = DEFAULT_LOGIN_TIMEOUT.as_secs())]
        timeout: u64,

        /// Only print the url, do not open a browser
        #[arg(long)]
        no_open: bool,

        /// Browser application to open instead of the system default
        #[arg(long)]
        browser: Option<String>,

        /// Print only the url, undecorated, on stdout
        #[arg(long)]
        bare: bool,

        /// Sign out of IMS before logging in
        #[arg(long)]
        force: bool,
    },

    /// Log in with the flow selected from an IMS context config file
    Context {
        /// TOML file holding the context (client_id, scopes, ...)
        #[arg(long)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    ims_oauth_lib::init_logging(cli.verbose);

    match run(cli.command).await {
        Ok(json) => println!("{json}"),
        Err(err) => {
            eprintln!("{err}");
            process::exit(1);
        }
    }
}

async fn run(command: Commands) -> AppResult<String> {
    match command {
        Commands::Login {
            env,
            client_id,
            scope,
            redirect_uri,
            port,
            timeout,
            no_open,
            browser,
            bare,
            force,
        } => {
            let options = LoginOptions {
                client_id,
                scope,
                redirect_uri,
                env: ImsEnvironment::resolve(env.as_deref())?,
                port,
                timeout: Duration::from_secs(timeout),
                open: !no_open,
                browser,
                bare,
                force_login: force,
            };
            let credential = login(options, &LoginDeps::system()).await?;
            to_json(&credential)
        }
        Commands::Context { config } => {
            let config = load_config(&config)?;
            let ims = HttpImsClient::for_environment(config.environment()?)?;
            let login_deps = LoginDeps::system();
            let deps = FlowDeps {
                login: &login_deps,
                ims: &ims,
                web: None,
            };
            let result = ims_login(&config, deps).await?;
            to_json(&result)
        }
    }
}

fn to_json(value: &impl serde::Serialize) -> AppResult<String> {
    Ok(serde_json::to_string_pretty(value)
        .map_err(|e| format!("INTERNAL_ERROR: failed to serialize result: {e}"))?)
}

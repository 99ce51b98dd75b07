use clap::Parser;
use kraftnetes_operator::{
    cli::{Command, Opts},
    config::{self, OperatorConfig},
    controller,
    crd::{GameDefinition, GameServer},
    logging,
    names::OPERATOR_NAME,
};
use kube::CustomResourceExt;
use snafu::{ResultExt, Snafu};

const LOG_ENV: &str = "KRAFTNETES_OPERATOR_LOG";

#[derive(Debug, Snafu)]
enum Error {
    #[snafu(display("failed to serialize the CRDs"))]
    SerializeCrds { source: serde_yaml::Error },

    #[snafu(display("failed to initialize logging"))]
    InitializeLogging { source: logging::Error },

    #[snafu(display("invalid configuration"))]
    InvalidConfig { source: config::Error },

    #[snafu(display("failed to create the Kubernetes client"))]
    CreateClient { source: kube::Error },
}

#[snafu::report]
#[tokio::main]
async fn main() -> Result<(), Error> {
    let opts = Opts::parse();

    match opts.command {
        Command::Crd => {
            for crd in [GameDefinition::crd(), GameServer::crd()] {
                print!("---\n{}", serde_yaml::to_string(&crd).context(SerializeCrdsSnafu)?);
            }
        }
        Command::Run(args) => {
            logging::initialize_logging(LOG_ENV, OPERATOR_NAME).context(InitializeLoggingSnafu)?;
            let config = OperatorConfig::try_from(args).context(InvalidConfigSnafu)?;
            let client = kube::Client::try_default()
                .await
                .context(CreateClientSnafu)?;
            controller::run(client, config).await;
        }
    }

    Ok(())
}

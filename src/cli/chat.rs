use std::io::Write;
use std::sync::Arc;

use anyhow::Result;
use futures::{Stream, StreamExt};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::client::{Controller, HttpTransport, RequestId};

const RESET_COMMAND: &str = "/reset";

pub async fn run(url: &str, model: Option<String>) -> Result<()> {
    // Keep stdout for the conversation
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{}=warn", env!("CARGO_CRATE_NAME")).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut rl = DefaultEditor::new()?;
    let transport = Arc::new(HttpTransport::new(url));
    let mut controller = Controller::new(transport).with_model(model);

    loop {
        let readline = rl.readline(">>> ");
        match readline {
            Ok(line) if line.trim() == RESET_COMMAND => {
                controller.reset();
                println!("Conversation cleared.");
            }
            Ok(line) => {
                let _ = rl.add_history_entry(line.as_str());
                let Some(id) = controller.submit(&line) else {
                    continue;
                };
                let mut signals = Box::pin(interrupts());
                let mut stdout = std::io::stdout();
                print_reply(&mut controller, id, &mut signals, &mut stdout).await?;
            }
            Err(ReadlineError::Interrupted) => break,
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                println!("Error: {:?}", err);
                break;
            }
        }
    }

    Ok(())
}

// One listener for the whole reply, so a Ctrl-C that lands between two
// steps is still delivered
fn interrupts() -> impl Stream<Item = ()> {
    async_stream::stream! {
        while tokio::signal::ctrl_c().await.is_ok() {
            yield ();
        }
    }
}

// Prints the reply as it streams in. An interrupt cancels the exchange
// and leaves whatever arrived so far.
async fn print_reply<I, W>(
    controller: &mut Controller,
    id: RequestId,
    interrupts: &mut I,
    out: &mut W,
) -> Result<()>
where
    I: Stream<Item = ()> + Unpin,
    W: Write,
{
    let mut printed = String::new();

    while controller.is_in_flight(id) {
        let mut interrupted = false;
        let stepped = tokio::select! {
            biased;
            Some(()) = interrupts.next() => {
                interrupted = true;
                None
            }
            stepped = controller.step() => stepped,
        };

        if interrupted {
            controller.cancel();
            continue;
        }
        if stepped.is_none() {
            break;
        }

        let Some(turn) = controller.reply(id) else {
            continue;
        };
        match turn.content.strip_prefix(printed.as_str()) {
            Some(rest) => write!(out, "{}", rest)?,
            // Failures replace what was shown
            None => write!(out, "\n{}", turn.content)?,
        }
        printed.clone_from(&turn.content);
        out.flush()?;
    }

    writeln!(out)?;
    Ok(())
}

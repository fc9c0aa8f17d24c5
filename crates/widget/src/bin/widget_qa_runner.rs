use std::env;
use std::rc::Rc;

use snafu::{OptionExt, ResultExt, Snafu};

use chatbot_responder::{Responder, ResponderConfig, ResponderError, create_responder};
use chatbot_widget::{
    ChatWidget, ExchangeOutcome, MemoryDocument, SendState, WidgetError, WidgetEvent,
    WidgetSettings, mount,
};

#[derive(Debug, Clone)]
struct RunnerArgs {
    scenario: Scenario,
    endpoint: Option<String>,
    csrf_token: Option<String>,
    csrf_header: Option<String>,
    settings_path: Option<String>,
    messages: Vec<String>,
}

#[derive(Debug, Clone, Copy)]
enum Scenario {
    MountIdempotent,
    BlankIgnored,
    PendingGuard,
    RoundTrip,
    All,
}

impl Scenario {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "mount_idempotent" => Some(Self::MountIdempotent),
            "blank_ignored" => Some(Self::BlankIgnored),
            "pending_guard" => Some(Self::PendingGuard),
            "round_trip" => Some(Self::RoundTrip),
            "all" => Some(Self::All),
            _ => None,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::MountIdempotent => "mount_idempotent",
            Self::BlankIgnored => "blank_ignored",
            Self::PendingGuard => "pending_guard",
            Self::RoundTrip => "round_trip",
            Self::All => "all",
        }
    }
}

#[derive(Debug, Snafu)]
enum RunnerError {
    #[snafu(display("missing required --scenario argument"))]
    MissingScenario { stage: &'static str },
    #[snafu(display("missing value for argument '{arg}'"))]
    MissingArgumentValue {
        stage: &'static str,
        arg: &'static str,
    },
    #[snafu(display("unknown scenario '{raw}'"))]
    UnknownScenario { stage: &'static str, raw: String },
    #[snafu(display("unknown argument '{raw}'"))]
    UnknownArgument { stage: &'static str, raw: String },
    #[snafu(display("responder setup failed: {source}"))]
    ResponderSetup {
        stage: &'static str,
        source: ResponderError,
    },
    #[snafu(display("widget setup failed: {source}"))]
    WidgetSetup {
        stage: &'static str,
        source: WidgetError,
    },
    #[snafu(display("scenario '{scenario}' failed: {reason}"))]
    ScenarioFailed {
        stage: &'static str,
        scenario: &'static str,
        reason: String,
    },
}

type RunnerResult<T> = Result<T, RunnerError>;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    if let Err(error) = run().await {
        println!("runner_ok=false");
        eprintln!("runner_error={error}");
        std::process::exit(1);
    }
}

async fn run() -> RunnerResult<()> {
    let args = parse_args(env::args().skip(1))?;
    println!("scenario={}", args.scenario.name());

    let settings = match args.settings_path.as_deref() {
        Some(path) => WidgetSettings::load(path).context(WidgetSetupSnafu {
            stage: "load-settings",
        })?,
        None => WidgetSettings::default(),
    };
    let responder = build_responder(&args)?;
    println!("responder_id={}", responder.id());

    match args.scenario {
        Scenario::MountIdempotent => run_mount_idempotent(&responder, &settings)?,
        Scenario::BlankIgnored => run_blank_ignored(&responder, &settings)?,
        Scenario::PendingGuard => run_pending_guard(&responder, &settings)?,
        Scenario::RoundTrip => run_round_trip(&responder, &settings, &args.messages).await?,
        Scenario::All => {
            run_mount_idempotent(&responder, &settings)?;
            run_blank_ignored(&responder, &settings)?;
            run_pending_guard(&responder, &settings)?;
            run_round_trip(&responder, &settings, &args.messages).await?;
            println!("all_passed=true");
        }
    }

    println!("runner_ok=true");
    Ok(())
}

fn parse_args(args: impl IntoIterator<Item = String>) -> RunnerResult<RunnerArgs> {
    let mut scenario = None;
    let mut endpoint = None;
    let mut csrf_token = None;
    let mut csrf_header = None;
    let mut settings_path = None;
    let mut messages = Vec::new();
    let mut pending = args.into_iter();

    while let Some(argument) = pending.next() {
        match argument.as_str() {
            "--scenario" => {
                let value = pending.next().context(MissingArgumentValueSnafu {
                    stage: "parse-args-scenario-value",
                    arg: "--scenario",
                })?;

                let parsed = Scenario::parse(&value).context(UnknownScenarioSnafu {
                    stage: "parse-args-scenario",
                    raw: value,
                })?;
                scenario = Some(parsed);
            }
            "--endpoint" => {
                endpoint = Some(pending.next().context(MissingArgumentValueSnafu {
                    stage: "parse-args-endpoint-value",
                    arg: "--endpoint",
                })?);
            }
            "--csrf-token" => {
                csrf_token = Some(pending.next().context(MissingArgumentValueSnafu {
                    stage: "parse-args-csrf-token-value",
                    arg: "--csrf-token",
                })?);
            }
            "--csrf-header" => {
                csrf_header = Some(pending.next().context(MissingArgumentValueSnafu {
                    stage: "parse-args-csrf-header-value",
                    arg: "--csrf-header",
                })?);
            }
            "--settings" => {
                settings_path = Some(pending.next().context(MissingArgumentValueSnafu {
                    stage: "parse-args-settings-value",
                    arg: "--settings",
                })?);
            }
            "--message" => {
                messages.push(pending.next().context(MissingArgumentValueSnafu {
                    stage: "parse-args-message-value",
                    arg: "--message",
                })?);
            }
            _ => {
                return UnknownArgumentSnafu {
                    stage: "parse-args",
                    raw: argument,
                }
                .fail();
            }
        }
    }

    if messages.is_empty() {
        messages.push("hello".to_string());
    }

    Ok(RunnerArgs {
        scenario: scenario.context(MissingScenarioSnafu {
            stage: "parse-args-scenario-required",
        })?,
        endpoint,
        csrf_token,
        csrf_header,
        settings_path,
        messages,
    })
}

/// Uses the HTTP responder when an endpoint is given, otherwise the local echo responder.
fn build_responder(args: &RunnerArgs) -> RunnerResult<Rc<dyn Responder>> {
    let config = match args.endpoint.as_deref() {
        Some(endpoint) => {
            let config =
                ResponderConfig::new(endpoint, args.csrf_token.clone().unwrap_or_default());
            match args.csrf_header.as_deref() {
                Some(header) => config.with_csrf_header(header),
                None => config,
            }
        }
        None => ResponderConfig::echo(),
    };

    create_responder(config).context(ResponderSetupSnafu {
        stage: "create-responder",
    })
}

fn mount_fresh(
    responder: &Rc<dyn Responder>,
    settings: &WidgetSettings,
    scenario: &'static str,
) -> RunnerResult<(MemoryDocument, ChatWidget)> {
    let document = MemoryDocument::new();
    let widget = mount(&document, responder.clone(), settings)
        .context(WidgetSetupSnafu {
            stage: "mount-widget",
        })?
        .context(ScenarioFailedSnafu {
            stage: "mount-widget-fresh",
            scenario,
            reason: "fresh document reported an existing widget".to_string(),
        })?;
    Ok((document, widget))
}

fn run_mount_idempotent(
    responder: &Rc<dyn Responder>,
    settings: &WidgetSettings,
) -> RunnerResult<()> {
    let (document, _widget) = mount_fresh(responder, settings, "mount_idempotent")?;
    let second = mount(&document, responder.clone(), settings).context(WidgetSetupSnafu {
        stage: "mount-widget-again",
    })?;

    let root_count = document.root_count();
    println!("second_mount_skipped={}", second.is_none());
    println!("root_count={root_count}");

    if second.is_some() || root_count != 1 {
        return ScenarioFailedSnafu {
            stage: "mount-idempotent-verify",
            scenario: "mount_idempotent",
            reason: format!("expected a single root, found {root_count}"),
        }
        .fail();
    }

    Ok(())
}

fn run_blank_ignored(responder: &Rc<dyn Responder>, settings: &WidgetSettings) -> RunnerResult<()> {
    let (document, widget) = mount_fresh(responder, settings, "blank_ignored")?;
    document.type_text("   \t ");
    let accepted = widget.handle_event(WidgetEvent::Send).is_some();
    let transcript_len = widget.controller().transcript_len();

    println!("blank_accepted={accepted}");
    println!("blank_transcript_len={transcript_len}");

    if accepted || transcript_len != 0 {
        return ScenarioFailedSnafu {
            stage: "blank-ignored-verify",
            scenario: "blank_ignored",
            reason: "whitespace input reached the transcript".to_string(),
        }
        .fail();
    }

    Ok(())
}

fn run_pending_guard(responder: &Rc<dyn Responder>, settings: &WidgetSettings) -> RunnerResult<()> {
    let (document, widget) = mount_fresh(responder, settings, "pending_guard")?;

    document.type_text("first");
    let exchange = widget
        .handle_event(WidgetEvent::Send)
        .context(ScenarioFailedSnafu {
            stage: "pending-guard-first",
            scenario: "pending_guard",
            reason: "first submission was rejected".to_string(),
        })?;

    document.type_text("second");
    let second_accepted = widget.handle_event(WidgetEvent::Send).is_some();
    let pending_len = widget.controller().transcript_len();
    drop(exchange);
    let state = widget.controller().send_state();

    println!("second_accepted={second_accepted}");
    println!("pending_transcript_len={pending_len}");
    println!("released_idle={}", state == SendState::Idle);

    if second_accepted || pending_len != 1 || state != SendState::Idle {
        return ScenarioFailedSnafu {
            stage: "pending-guard-verify",
            scenario: "pending_guard",
            reason: format!("pending guard broken, state {state:?}"),
        }
        .fail();
    }

    Ok(())
}

async fn run_round_trip(
    responder: &Rc<dyn Responder>,
    settings: &WidgetSettings,
    messages: &[String],
) -> RunnerResult<()> {
    let (document, widget) = mount_fresh(responder, settings, "round_trip")?;

    for message in messages {
        document.type_text(message);
        let Some(exchange) = widget.handle_event(WidgetEvent::Send) else {
            println!("skipped={message:?}");
            continue;
        };

        let outcome = exchange.settle().await;
        let label = match &outcome {
            ExchangeOutcome::Replied => "replied",
            ExchangeOutcome::EmptyReply => "empty_reply",
            ExchangeOutcome::Failed(_) => "failed",
            ExchangeOutcome::Abandoned => "abandoned",
        };
        println!("outcome={label}");
    }

    for message in widget.controller().messages() {
        println!("{}={:?}", message.role.as_str(), message.text);
    }

    let input_cleared = document
        .snapshot()
        .is_some_and(|snapshot| snapshot.input_value.is_empty());
    println!("input_cleared={input_cleared}");

    widget.dispose();
    println!("disposed_root_count={}", document.root_count());
    Ok(())
}

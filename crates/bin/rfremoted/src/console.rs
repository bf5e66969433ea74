//! Line-oriented console — the daemon's driving surface.
//!
//! Each input line parses into a [`Command`]; the [`Console`] runs it
//! against the session and the saved-code service and renders a reply.
//! Positions typed by the user are 1-based, as listed by `devices`,
//! `sniffed` and `codes`.

use std::fmt::Write as _;

use rfremote_app::ports::SavedCodeRepository;
use rfremote_app::services::saved_code_service::{SavedCodeError, SavedCodeService};
use rfremote_app::session::{SessionError, SessionHandle};
use rfremote_domain::band::FrequencyBand;
use rfremote_domain::rf_command::RfCommand;
use rfremote_domain::saved_code::SavedCodeRecord;

pub const HELP: &str = "\
commands:
  scan                          discover peripherals
  stop                          end the scan early
  devices                       list discovered peripherals
  select <n>                    connect to peripheral n
  disconnect                    close the link and forget the peripheral
  reconnect                     retry the last peripheral
  access                        check radio access again
  state                         show the connection state
  send <n>                      transmit saved code n
  rapid <n>                     transmit saved code n as a burst
  raw <code> <315|433> <protocol> <repeat>
                                transmit a code typed in
  sniffed                       list captured codes
  save <n> <alias>              save captured code n
  clear                         drop all captured codes
  codes                         list saved codes
  fav <n>                       toggle favourite on saved code n
  rm <n>                        delete saved code n
  mv <from> <to>                move saved code
  log                           show recent raw notifications
  help                          show this text
  quit                          disconnect and exit";

/// One parsed console line. Positions are 0-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Scan,
    StopScan,
    Devices,
    Select(usize),
    Disconnect,
    Reconnect,
    Access,
    State,
    Send(usize),
    Rapid(usize),
    Raw(RfCommand),
    Sniffed,
    Save { position: usize, alias: String },
    Clear,
    Codes,
    Favorite(usize),
    Remove(usize),
    Move { from: usize, to: usize },
    Log,
    Help,
    Quit,
}

/// Why a line could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("empty line")]
    Empty,
    #[error("unknown command {0:?}, try `help`")]
    Unknown(String),
    #[error("missing argument <{0}>")]
    MissingArgument(&'static str),
    #[error("{0:?} is not a valid position")]
    InvalidPosition(String),
    #[error("{0:?} is not a valid number")]
    InvalidNumber(String),
    #[error("unsupported frequency {0:?}, use 315 or 433")]
    InvalidBand(String),
}

impl Command {
    /// Parse one input line.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`] for blank lines, unknown verbs and missing or
    /// malformed arguments.
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let line = line.trim();
        let (verb, rest) = line
            .split_once(char::is_whitespace)
            .map_or((line, ""), |(verb, rest)| (verb, rest.trim()));
        let mut args = rest.split_whitespace();

        let command = match verb.to_ascii_lowercase().as_str() {
            "" => return Err(ParseError::Empty),
            "scan" => Self::Scan,
            "stop" => Self::StopScan,
            "devices" => Self::Devices,
            "select" => Self::Select(position(args.next(), "n")?),
            "disconnect" => Self::Disconnect,
            "reconnect" => Self::Reconnect,
            "access" => Self::Access,
            "state" => Self::State,
            "send" => Self::Send(position(args.next(), "n")?),
            "rapid" => Self::Rapid(position(args.next(), "n")?),
            "raw" => {
                let code = args.next().ok_or(ParseError::MissingArgument("code"))?;
                let band = band(args.next())?;
                let protocol = number(args.next(), "protocol")?;
                let repeat = number(args.next(), "repeat")?;
                Self::Raw(RfCommand::new(code, band, protocol, repeat))
            }
            "sniffed" => Self::Sniffed,
            "save" => {
                let position = position(args.next(), "n")?;
                let alias = rest
                    .split_once(char::is_whitespace)
                    .map(|(_, alias)| alias.trim())
                    .filter(|alias| !alias.is_empty())
                    .ok_or(ParseError::MissingArgument("alias"))?;
                Self::Save {
                    position,
                    alias: alias.to_string(),
                }
            }
            "clear" => Self::Clear,
            "codes" => Self::Codes,
            "fav" => Self::Favorite(position(args.next(), "n")?),
            "rm" => Self::Remove(position(args.next(), "n")?),
            "mv" => Self::Move {
                from: position(args.next(), "from")?,
                to: position(args.next(), "to")?,
            },
            "log" => Self::Log,
            "help" | "?" => Self::Help,
            "quit" | "exit" => Self::Quit,
            other => return Err(ParseError::Unknown(other.to_string())),
        };
        Ok(command)
    }
}

fn position(arg: Option<&str>, name: &'static str) -> Result<usize, ParseError> {
    let arg = arg.ok_or(ParseError::MissingArgument(name))?;
    match arg.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n - 1),
        _ => Err(ParseError::InvalidPosition(arg.to_string())),
    }
}

fn number<T: std::str::FromStr>(arg: Option<&str>, name: &'static str) -> Result<T, ParseError> {
    let arg = arg.ok_or(ParseError::MissingArgument(name))?;
    arg.parse()
        .map_err(|_| ParseError::InvalidNumber(arg.to_string()))
}

fn band(arg: Option<&str>) -> Result<FrequencyBand, ParseError> {
    let arg = arg.ok_or(ParseError::MissingArgument("315|433"))?;
    match arg.trim_end_matches("MHz").trim_end_matches("mhz") {
        "315" => Ok(FrequencyBand::Low),
        "433" | "443" => Ok(FrequencyBand::High),
        _ => Err(ParseError::InvalidBand(arg.to_string())),
    }
}

/// Failure while running a parsed command.
#[derive(Debug, thiserror::Error)]
pub enum ConsoleError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Codes(#[from] SavedCodeError),
    #[error("no discovered peripheral #{}", .0 + 1)]
    UnknownDevice(usize),
    #[error("no captured code #{}", .0 + 1)]
    UnknownSniffed(usize),
}

/// What the caller should do after a command ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Print(String),
    Quit,
}

/// Runs console commands against the live session.
pub struct Console<R> {
    session: SessionHandle,
    codes: SavedCodeService<R>,
}

impl<R: SavedCodeRepository> Console<R> {
    #[must_use]
    pub fn new(session: SessionHandle, codes: SavedCodeService<R>) -> Self {
        Self { session, codes }
    }

    /// Run one command.
    ///
    /// # Errors
    ///
    /// Returns [`ConsoleError`] when the session or the saved-code service
    /// rejects the request, or a position does not exist.
    pub async fn execute(&self, command: Command) -> Result<Outcome, ConsoleError> {
        let text = match command {
            Command::Scan => {
                self.session.scan().await?;
                "scanning, list results with `devices`".to_string()
            }
            Command::StopScan => {
                self.session.stop_scan().await?;
                "scan stopped".to_string()
            }
            Command::Devices => self.render_devices(),
            Command::Select(position) => {
                let peripheral = self
                    .session
                    .candidates()
                    .into_iter()
                    .nth(position)
                    .ok_or(ConsoleError::UnknownDevice(position))?;
                self.session.select(peripheral).await?;
                format!("connected: {}", self.session.state())
            }
            Command::Disconnect => {
                self.session.disconnect().await?;
                "disconnected".to_string()
            }
            Command::Reconnect => {
                self.session.reconnect().await?;
                format!("connected: {}", self.session.state())
            }
            Command::Access => {
                self.session.recheck_access().await?;
                "radio access granted".to_string()
            }
            Command::State => self.session.state().to_string(),
            Command::Send(position) => {
                let command = self.codes.command_at(position).await?;
                self.session.send_command(command).await?;
                "sent".to_string()
            }
            Command::Rapid(position) => {
                let command = self.codes.command_at(position).await?;
                let report = self.session.rapid_send(command).await?;
                format!("sent {}/{}", report.accepted, report.attempted)
            }
            Command::Raw(command) => {
                self.session.send_command(command).await?;
                "sent".to_string()
            }
            Command::Sniffed => self.render_sniffed(),
            Command::Save { position, alias } => {
                let router = self.session.router();
                let code = router
                    .pending()
                    .into_iter()
                    .nth(position)
                    .ok_or(ConsoleError::UnknownSniffed(position))?;
                let record = self.codes.promote_and_save(router, code.id, &alias).await?;
                format!("saved {:?}", record.alias)
            }
            Command::Clear => {
                let count = self.session.router().clear_all();
                format!("cleared {count} captured code(s)")
            }
            Command::Codes => render_codes(&self.codes.list().await?),
            Command::Favorite(position) => {
                let favorite = self.codes.toggle_favorite(position).await?;
                if favorite {
                    "marked as favourite".to_string()
                } else {
                    "unmarked".to_string()
                }
            }
            Command::Remove(position) => {
                let record = self.codes.remove(position).await?;
                format!("removed {:?}", record.alias)
            }
            Command::Move { from, to } => {
                self.codes.move_to(from, to).await?;
                "moved".to_string()
            }
            Command::Log => {
                let payloads = self.session.router().recent_payloads();
                if payloads.is_empty() {
                    "no notifications yet".to_string()
                } else {
                    payloads.join("\n")
                }
            }
            Command::Help => HELP.to_string(),
            Command::Quit => return Ok(Outcome::Quit),
        };
        Ok(Outcome::Print(text))
    }

    fn render_devices(&self) -> String {
        let candidates = self.session.candidates();
        if candidates.is_empty() {
            return "no peripherals discovered".to_string();
        }
        let mut out = String::new();
        for (index, peripheral) in candidates.iter().enumerate() {
            let _ = writeln!(out, "{:>3}. {peripheral}", index + 1);
        }
        out.trim_end().to_string()
    }

    fn render_sniffed(&self) -> String {
        let pending = self.session.router().pending();
        if pending.is_empty() {
            return "no captured codes".to_string();
        }
        let mut out = String::new();
        for (index, code) in pending.iter().enumerate() {
            let _ = writeln!(
                out,
                "{:>3}. {} {} protocol {}",
                index + 1,
                code.raw,
                code.band,
                code.protocol
            );
        }
        out.trim_end().to_string()
    }
}

fn render_codes(records: &[SavedCodeRecord]) -> String {
    if records.is_empty() {
        return "no saved codes".to_string();
    }
    let mut out = String::new();
    for (index, record) in records.iter().enumerate() {
        let star = if record.favorite { '*' } else { ' ' };
        let _ = writeln!(
            out,
            "{:>3}.{star}{} = {} {} protocol {} x{}",
            index + 1,
            record.alias,
            record.code,
            record.band,
            record.protocol,
            record.repeat
        );
    }
    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use rfremote_app::router::NotificationRouter;
    use rfremote_app::session::{ConnectionSession, SessionConfig};
    use rfremote_app::testing::{FakeGateway, InMemorySavedCodes, InMemorySessionStore};
    use rfremote_domain::connection::ConnectionState;
    use rfremote_domain::gatt::GattProfile;
    use rfremote_domain::peripheral::PeripheralRef;

    #[test]
    fn should_parse_simple_verbs() {
        assert_eq!(Command::parse("scan"), Ok(Command::Scan));
        assert_eq!(Command::parse("  STOP "), Ok(Command::StopScan));
        assert_eq!(Command::parse("quit"), Ok(Command::Quit));
        assert_eq!(Command::parse("?"), Ok(Command::Help));
    }

    #[test]
    fn should_parse_positions_as_zero_based() {
        assert_eq!(Command::parse("select 1"), Ok(Command::Select(0)));
        assert_eq!(Command::parse("rapid 3"), Ok(Command::Rapid(2)));
        assert_eq!(
            Command::parse("mv 2 1"),
            Ok(Command::Move { from: 1, to: 0 })
        );
    }

    #[test]
    fn should_reject_position_zero() {
        assert_eq!(
            Command::parse("send 0"),
            Err(ParseError::InvalidPosition("0".to_string()))
        );
    }

    #[test]
    fn should_keep_spaces_in_alias() {
        assert_eq!(
            Command::parse("save 2   Garage door  "),
            Ok(Command::Save {
                position: 1,
                alias: "Garage door".to_string()
            })
        );
        assert_eq!(
            Command::parse("save 2"),
            Err(ParseError::MissingArgument("alias"))
        );
    }

    #[test]
    fn should_parse_raw_command() {
        let parsed = Command::parse("raw 5592405 433 1 4").unwrap();
        assert_eq!(
            parsed,
            Command::Raw(RfCommand::new("5592405", FrequencyBand::High, 1, 4))
        );
        assert_eq!(
            Command::parse("raw 5592405 315MHz 2 1").unwrap(),
            Command::Raw(RfCommand::new("5592405", FrequencyBand::Low, 2, 1))
        );
    }

    #[test]
    fn should_reject_bad_raw_arguments() {
        assert_eq!(
            Command::parse("raw 1 868 1 1"),
            Err(ParseError::InvalidBand("868".to_string()))
        );
        assert_eq!(
            Command::parse("raw 1 433 x 1"),
            Err(ParseError::InvalidNumber("x".to_string()))
        );
        assert_eq!(
            Command::parse("raw 1 433 1"),
            Err(ParseError::MissingArgument("repeat"))
        );
    }

    #[test]
    fn should_reject_empty_and_unknown_lines() {
        assert_eq!(Command::parse("   "), Err(ParseError::Empty));
        assert_eq!(
            Command::parse("launch"),
            Err(ParseError::Unknown("launch".to_string()))
        );
    }

    fn console(gateway: FakeGateway) -> (Console<InMemorySavedCodes>, SessionHandle) {
        let router = Arc::new(NotificationRouter::default());
        let session = ConnectionSession::spawn(
            gateway,
            InMemorySessionStore::new(),
            router,
            SessionConfig::default(),
            GattProfile::default(),
        );
        let codes = SavedCodeService::new(InMemorySavedCodes::new());
        (Console::new(session.clone(), codes), session)
    }

    async fn run(console: &Console<InMemorySavedCodes>, line: &str) -> String {
        match console.execute(Command::parse(line).unwrap()).await.unwrap() {
            Outcome::Print(text) => text,
            Outcome::Quit => panic!("unexpected quit"),
        }
    }

    #[tokio::test]
    async fn should_select_discovered_device_by_position() {
        let gateway = FakeGateway::with_devices(vec![
            PeripheralRef::new("AA", Some("Remote A".to_string())),
            PeripheralRef::new("BB", Some("Remote B".to_string())),
        ]);
        gateway.set_finite_scan(true);
        let (console, session) = console(gateway.clone());

        run(&console, "scan").await;
        let mut candidates = session.watch_candidates();
        candidates.wait_for(|c| c.len() == 2).await.unwrap();

        let listing = run(&console, "devices").await;
        assert!(listing.contains("1. Remote A (AA)"));
        assert!(listing.contains("2. Remote B (BB)"));

        run(&console, "select 2").await;
        assert!(matches!(session.state(), ConnectionState::Ready(p) if p.id.as_str() == "BB"));
        session.shutdown().await;
    }

    #[tokio::test]
    async fn should_report_unknown_device() {
        let (console, session) = console(FakeGateway::new());
        let err = console.execute(Command::Select(4)).await.unwrap_err();
        assert_eq!(err.to_string(), "no discovered peripheral #5");
        session.shutdown().await;
    }

    #[tokio::test]
    async fn should_save_and_send_captured_code() {
        let gateway = FakeGateway::with_devices(vec![PeripheralRef::new("AA", None)]);
        let (console, session) = console(gateway.clone());
        session
            .select(PeripheralRef::new("AA", None))
            .await
            .unwrap();

        let mut events = session.router().subscribe();
        assert!(gateway.notify(b"5592405,2,1"));
        while session.router().pending().is_empty() {
            let _ = events.recv().await;
        }

        assert!(run(&console, "sniffed").await.contains("5592405 433 MHz protocol 1"));
        assert_eq!(run(&console, "save 1 Gate").await, "saved \"Gate\"");
        assert!(session.router().pending().is_empty());
        assert!(run(&console, "codes").await.contains("Gate = 5592405"));

        run(&console, "send 1").await;
        assert_eq!(gateway.writes(), vec![b"c,5592405,2,1,1".to_vec()]);
        session.shutdown().await;
    }

    #[tokio::test]
    async fn should_surface_not_ready_for_raw_send() {
        let gateway = FakeGateway::new();
        let (console, session) = console(gateway.clone());
        let err = console
            .execute(Command::parse("raw 1 315 1 1").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ConsoleError::Session(SessionError::NotReady { .. })
        ));
        assert!(gateway.writes().is_empty());
        session.shutdown().await;
    }

    #[tokio::test]
    async fn should_quit_without_touching_session() {
        let (console, session) = console(FakeGateway::new());
        assert_eq!(console.execute(Command::Quit).await.unwrap(), Outcome::Quit);
        assert_eq!(session.state(), ConnectionState::Idle);
        session.shutdown().await;
    }
}

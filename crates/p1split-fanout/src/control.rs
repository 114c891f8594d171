//! Operator console.
//!
//! Line-oriented commands over the port state. Port `0` is the receiver,
//! ports `1..=N` are the senders. Rejected commands never change state.

use std::time::Duration;

use tracing::info;

use crate::counters::SplitterStats;
use crate::error::ControlError;
use crate::slot::RING_DEPTH;
use crate::splitter::Splitter;

/// Console command names and descriptions.
pub const COMMANDS: &[(&str, &str)] = &[
    ("disable", "Disable port"),
    ("dump", "Dump port buffer"),
    ("enable", "Enable port"),
    ("help", "List commands"),
    ("interval", "Set update interval"),
    ("stats", "Splitter statistics"),
];

/// A parsed console command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Enable { port: usize },
    Disable { port: usize },
    Interval { port: usize, interval: Duration },
    Dump { port: usize, slot: usize },
    Stats,
    Help,
}

/// Result of a successful command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// State changed, nothing to show.
    Done,
    /// Raw buffer contents.
    Dump(Vec<u8>),
    Stats(SplitterStats),
    Help(&'static [(&'static str, &'static str)]),
}

impl Command {
    /// Parse one console line for a splitter with `ports` sender ports.
    ///
    /// Returns `Ok(None)` for a blank line.
    pub fn parse(line: &str, ports: usize) -> Result<Option<Self>, ControlError> {
        let mut words = line.split_whitespace();
        let Some(name) = words.next() else {
            return Ok(None);
        };
        let args: Vec<&str> = words.collect();

        let command = match name {
            "enable" | "disable" => {
                let [port] = args[..] else {
                    return Err(usage(format!("{name} <port 0-{ports}>")));
                };
                let port = parse_port(port, ports)?;
                if name == "enable" {
                    Self::Enable { port }
                } else {
                    Self::Disable { port }
                }
            }
            "interval" => {
                let [port, interval] = args[..] else {
                    return Err(usage(format!("interval <port 0-{ports}> <milliseconds>")));
                };
                let port = parse_port(port, ports)?;
                let interval = match interval.parse::<u64>() {
                    Ok(ms) if ms > 0 => Duration::from_millis(ms),
                    _ => {
                        return Err(ControlError::InvalidValue {
                            what: "interval",
                            value: interval.to_string(),
                        })
                    }
                };
                Self::Interval { port, interval }
            }
            "dump" => {
                let dump_usage =
                    || usage(format!("dump <port 0-{ports}> [<slot 0-{}>]", RING_DEPTH - 1));
                let (port, slot) = match args[..] {
                    [port] => (parse_port(port, ports)?, None),
                    [port, slot] => (parse_port(port, ports)?, Some(parse_number(slot, "slot")?)),
                    _ => return Err(dump_usage()),
                };
                let slot = match (port, slot) {
                    (0, None | Some(0)) => 0,
                    (0, Some(slot)) => return Err(ControlError::SlotOutOfRange { slot, max: 0 }),
                    (_, None) => return Err(dump_usage()),
                    (_, Some(slot)) if slot >= RING_DEPTH => {
                        return Err(ControlError::SlotOutOfRange {
                            slot,
                            max: RING_DEPTH - 1,
                        })
                    }
                    (_, Some(slot)) => slot,
                };
                Self::Dump { port, slot }
            }
            "stats" | "help" => {
                if !args.is_empty() {
                    return Err(usage(name.to_string()));
                }
                if name == "stats" {
                    Self::Stats
                } else {
                    Self::Help
                }
            }
            other => return Err(ControlError::UnknownCommand(other.to_string())),
        };
        Ok(Some(command))
    }
}

fn usage(usage: String) -> ControlError {
    ControlError::Usage { usage }
}

fn parse_number(value: &str, what: &'static str) -> Result<usize, ControlError> {
    value.parse().map_err(|_| ControlError::InvalidValue {
        what,
        value: value.to_string(),
    })
}

fn parse_port(value: &str, ports: usize) -> Result<usize, ControlError> {
    let port = parse_number(value, "port")?;
    if port > ports {
        return Err(ControlError::PortOutOfRange { port, max: ports });
    }
    Ok(port)
}

impl Splitter {
    /// Parse and run one console line.
    pub fn execute_line(&self, line: &str) -> Result<Option<Reply>, ControlError> {
        match Command::parse(line, self.port_count())? {
            Some(command) => self.execute(command).map(Some),
            None => Ok(None),
        }
    }

    /// Run a parsed command.
    pub fn execute(&self, command: Command) -> Result<Reply, ControlError> {
        match command {
            Command::Enable { port } | Command::Disable { port } => {
                let enabled = matches!(command, Command::Enable { .. });
                self.port_control(port)?.set_enabled(enabled);
                info!(port, enabled, "port toggled");
                Ok(Reply::Done)
            }
            Command::Interval { port, interval } => {
                self.port_control(port)?.set_interval(interval);
                info!(port, interval = ?interval, "port interval changed");
                Ok(Reply::Done)
            }
            Command::Dump { port: 0, .. } => Ok(Reply::Dump(self.receiver().buffer().snapshot())),
            Command::Dump { port, slot } => {
                let sender = self.sender(port).ok_or(ControlError::PortOutOfRange {
                    port,
                    max: self.port_count(),
                })?;
                let slot = sender.slot(slot).ok_or(ControlError::SlotOutOfRange {
                    slot,
                    max: RING_DEPTH - 1,
                })?;
                Ok(Reply::Dump(slot.snapshot()))
            }
            Command::Stats => Ok(Reply::Stats(self.stats())),
            Command::Help => Ok(Reply::Help(COMMANDS)),
        }
    }

    fn port_control(&self, port: usize) -> Result<&crate::schedule::PortControl, ControlError> {
        if port == 0 {
            return Ok(self.receiver().control());
        }
        self.sender(port)
            .map(|sender| sender.control())
            .ok_or(ControlError::PortOutOfRange {
                port,
                max: self.port_count(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::receiver::tests::Scripted;
    use crate::receiver::ReceiverPort;
    use crate::sender::SenderPort;

    fn splitter() -> Splitter {
        let receiver = ReceiverPort::new(
            Box::new(Scripted::new(vec![Ok(b"/T!\r\n".to_vec())])),
            64,
            true,
            Duration::from_millis(1000),
        );
        let senders = (1..=3)
            .map(|port| SenderPort::new(port, 64, true, Duration::from_millis(1000)))
            .collect();
        Splitter::new(receiver, senders)
    }

    #[test]
    fn parses_every_command() {
        assert_eq!(
            Command::parse("enable 2", 3).unwrap(),
            Some(Command::Enable { port: 2 })
        );
        assert_eq!(
            Command::parse("  disable   0 ", 3).unwrap(),
            Some(Command::Disable { port: 0 })
        );
        assert_eq!(
            Command::parse("interval 1 250", 3).unwrap(),
            Some(Command::Interval {
                port: 1,
                interval: Duration::from_millis(250)
            })
        );
        assert_eq!(
            Command::parse("dump 0", 3).unwrap(),
            Some(Command::Dump { port: 0, slot: 0 })
        );
        assert_eq!(
            Command::parse("dump 3 2", 3).unwrap(),
            Some(Command::Dump { port: 3, slot: 2 })
        );
        assert_eq!(Command::parse("stats", 3).unwrap(), Some(Command::Stats));
        assert_eq!(Command::parse("help", 3).unwrap(), Some(Command::Help));
        assert_eq!(Command::parse("   ", 3).unwrap(), None);
    }

    #[test]
    fn rejects_malformed_commands() {
        assert!(matches!(
            Command::parse("reboot", 3),
            Err(ControlError::UnknownCommand(name)) if name == "reboot"
        ));
        assert!(matches!(
            Command::parse("enable", 3),
            Err(ControlError::Usage { usage }) if usage == "enable <port 0-3>"
        ));
        assert!(matches!(
            Command::parse("enable 4", 3),
            Err(ControlError::PortOutOfRange { port: 4, max: 3 })
        ));
        assert!(matches!(
            Command::parse("enable one", 3),
            Err(ControlError::InvalidValue { what: "port", .. })
        ));
        assert!(matches!(
            Command::parse("interval 1", 3),
            Err(ControlError::Usage { .. })
        ));
        assert!(matches!(
            Command::parse("interval 1 0", 3),
            Err(ControlError::InvalidValue { what: "interval", .. })
        ));
        assert!(matches!(
            Command::parse("interval 1 -5", 3),
            Err(ControlError::InvalidValue { what: "interval", .. })
        ));
        assert!(matches!(
            Command::parse("stats now", 3),
            Err(ControlError::Usage { .. })
        ));
    }

    #[test]
    fn dump_slot_rules() {
        assert!(matches!(
            Command::parse("dump 0 1", 3),
            Err(ControlError::SlotOutOfRange { slot: 1, max: 0 })
        ));
        assert!(matches!(
            Command::parse("dump 1", 3),
            Err(ControlError::Usage { .. })
        ));
        assert!(matches!(
            Command::parse("dump 1 3", 3),
            Err(ControlError::SlotOutOfRange { slot: 3, max: 2 })
        ));
        assert!(matches!(
            Command::parse("dump 1 2 3", 3),
            Err(ControlError::Usage { .. })
        ));
    }

    #[test]
    fn enable_disable_and_interval_apply() {
        let splitter = splitter();

        splitter.execute_line("disable 0").unwrap();
        assert!(!splitter.receiver().control().is_enabled());
        splitter.execute_line("disable 2").unwrap();
        assert!(!splitter.sender(2).unwrap().control().is_enabled());
        splitter.execute_line("enable 2").unwrap();
        assert!(splitter.sender(2).unwrap().control().is_enabled());

        splitter.execute_line("interval 3 50").unwrap();
        assert_eq!(
            splitter.sender(3).unwrap().control().interval(),
            Duration::from_millis(50)
        );
        splitter.execute_line("interval 0 2000").unwrap();
        assert_eq!(
            splitter.receiver().control().interval(),
            Duration::from_secs(2)
        );
    }

    #[test]
    fn rejected_commands_leave_state_unchanged() {
        let splitter = splitter();
        let before = splitter.stats();

        for line in [
            "disable 4",
            "disable",
            "interval 1 abc",
            "interval 9 100",
            "interval 1 0",
            "dump 1 7",
            "enable 1 2",
            "frobnicate",
        ] {
            assert!(splitter.execute_line(line).is_err(), "{line} accepted");
        }

        assert_eq!(splitter.stats(), before);
    }

    #[test]
    fn dump_shows_buffer_contents() {
        let splitter = splitter();
        assert_eq!(splitter.receive_cycle(), Some(3));

        let Some(Reply::Dump(received)) = splitter.execute_line("dump 0").unwrap() else {
            panic!("expected dump");
        };
        assert_eq!(received, b"/T!\r\n");

        let Some(Reply::Dump(slot)) = splitter.execute_line("dump 1 1").unwrap() else {
            panic!("expected dump");
        };
        assert_eq!(slot, b"/T!\r\n");

        let Some(Reply::Dump(empty)) = splitter.execute_line("dump 1 0").unwrap() else {
            panic!("expected dump");
        };
        assert!(empty.is_empty());
    }

    #[test]
    fn stats_and_help_reply() {
        let splitter = splitter();
        let Some(Reply::Stats(stats)) = splitter.execute_line("stats").unwrap() else {
            panic!("expected stats");
        };
        assert_eq!(stats.senders.len(), 3);

        assert_eq!(
            splitter.execute_line("help").unwrap(),
            Some(Reply::Help(COMMANDS))
        );
    }
}

use std::io::Write;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use p1split_link::{FlowInput, NullLine, SerialLink};
use p1split_telegram::TelegramReader;
use tracing::{debug, info, warn};

use crate::config::SplitterConfig;
use crate::counters::SplitterStats;
use crate::error::{Result, SplitterError};
use crate::flow::FlowWatcher;
use crate::receiver::ReceiverPort;
use crate::schedule::{Shutdown, Ticker};
use crate::sender::SenderPort;

/// The splitter: one receiver port feeding a fixed set of sender ports.
///
/// Shared between the port threads and the control console through an
/// `Arc`. Port state is only reachable through this context.
#[derive(Debug)]
pub struct Splitter {
    receiver: ReceiverPort,
    senders: Vec<SenderPort>,
    shutdown: Shutdown,
}

impl Splitter {
    pub fn new(receiver: ReceiverPort, senders: Vec<SenderPort>) -> Self {
        Self {
            receiver,
            senders,
            shutdown: Shutdown::new(),
        }
    }

    pub fn receiver(&self) -> &ReceiverPort {
        &self.receiver
    }

    pub fn senders(&self) -> &[SenderPort] {
        &self.senders
    }

    /// Sender by console port number (1-based).
    pub fn sender(&self, port: usize) -> Option<&SenderPort> {
        port.checked_sub(1).and_then(|index| self.senders.get(index))
    }

    /// Number of sender ports.
    pub fn port_count(&self) -> usize {
        self.senders.len()
    }

    /// Run one receive cycle: read a telegram and offer it to the senders.
    pub fn receive_cycle(&self) -> Option<usize> {
        self.receiver.cycle(&self.senders)
    }

    pub fn stats(&self) -> SplitterStats {
        SplitterStats {
            receiver: self.receiver.stats(),
            senders: self.senders.iter().map(SenderPort::stats).collect(),
        }
    }

    pub fn shutdown(&self) -> &Shutdown {
        &self.shutdown
    }
}

/// Outbound side of one sender port.
pub struct SenderLink {
    /// Where telegrams are written.
    pub outbound: Box<dyn Write + Send>,
    /// The consumer's request line.
    pub flow: Box<dyn FlowInput>,
}

impl SenderLink {
    pub fn new(outbound: impl Write + Send + 'static, flow: impl FlowInput + 'static) -> Self {
        Self {
            outbound: Box::new(outbound),
            flow: Box::new(flow),
        }
    }
}

/// A running splitter.
pub struct SplitterHandle {
    splitter: Arc<Splitter>,
    threads: Vec<JoinHandle<()>>,
}

impl SplitterHandle {
    pub fn splitter(&self) -> &Arc<Splitter> {
        &self.splitter
    }

    /// Signal shutdown and wait for every port thread.
    ///
    /// The receiver finishes its read in progress first, so this can take up
    /// to one read deadline.
    pub fn stop(self) {
        self.splitter.shutdown.trigger();
        join_all(self.threads);
        info!("splitter stopped");
    }
}

fn join_all(threads: Vec<JoinHandle<()>>) {
    for thread in threads {
        let name = thread.thread().name().unwrap_or("port").to_string();
        if thread.join().is_err() {
            warn!(thread = %name, "port thread panicked");
        }
    }
}

/// Start the port threads: one receiver, and per sender one transmit
/// thread and one flow watcher.
///
/// `links` pairs up with the splitter's senders by position.
pub fn start(
    splitter: Splitter,
    links: Vec<SenderLink>,
    flow_poll: Duration,
) -> Result<SplitterHandle> {
    if links.len() != splitter.senders.len() {
        return Err(SplitterError::Config(format!(
            "{} links for {} sender ports",
            links.len(),
            splitter.senders.len()
        )));
    }

    let splitter = Arc::new(splitter);
    let mut threads = Vec::with_capacity(1 + 2 * links.len());

    let result = spawn_threads(&splitter, links, flow_poll, &mut threads);
    if let Err(err) = result {
        splitter.shutdown.trigger();
        join_all(threads);
        return Err(err);
    }

    info!(ports = splitter.port_count(), "splitter started");
    Ok(SplitterHandle { splitter, threads })
}

fn spawn_threads(
    splitter: &Arc<Splitter>,
    links: Vec<SenderLink>,
    flow_poll: Duration,
    threads: &mut Vec<JoinHandle<()>>,
) -> Result<()> {
    let shared = Arc::clone(splitter);
    threads.push(spawn("p1-receiver".to_string(), move || run_receiver(&shared))?);

    for (index, link) in links.into_iter().enumerate() {
        let port = index + 1;
        let SenderLink { outbound, flow } = link;

        let shared = Arc::clone(splitter);
        threads.push(spawn(format!("p1-sender-{port}"), move || {
            run_sender(&shared, index, outbound)
        })?);

        let shared = Arc::clone(splitter);
        threads.push(spawn(format!("p1-flow-{port}"), move || {
            FlowWatcher::new(flow).run(&shared.senders[index], flow_poll, &shared.shutdown)
        })?);
    }
    Ok(())
}

fn spawn<F>(name: String, body: F) -> Result<JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    std::thread::Builder::new()
        .name(name.clone())
        .spawn(body)
        .map_err(|source| SplitterError::Spawn { name, source })
}

fn run_receiver(splitter: &Splitter) {
    let mut ticker = Ticker::start();
    loop {
        splitter.receive_cycle();
        if !ticker.wait(splitter.receiver.control().interval(), &splitter.shutdown) {
            debug!("receiver stopped");
            return;
        }
    }
}

fn run_sender(splitter: &Splitter, index: usize, mut outbound: Box<dyn Write + Send>) {
    let sender = &splitter.senders[index];
    let mut ticker = Ticker::start();
    loop {
        sender.transmit_cycle(outbound.as_mut());
        if !ticker.wait(sender.control().interval(), &splitter.shutdown) {
            debug!(port = sender.port(), "sender stopped");
            return;
        }
    }
}

/// Open the devices named in `config` and start the splitter.
pub fn open(config: &SplitterConfig) -> Result<SplitterHandle> {
    config.validate()?;

    let reader_config = config.input.reader_config();
    let inbound = SerialLink::open(&config.input.device, &config.input.serial_settings())?;
    let reader = if config.input.request_line {
        let request = inbound.request_line()?;
        TelegramReader::spawn(inbound, request, reader_config.clone())?
    } else {
        TelegramReader::spawn(inbound, NullLine::default(), reader_config.clone())?
    };
    let receiver = ReceiverPort::new(
        Box::new(reader),
        reader_config.telegram_size,
        config.input.port.enabled,
        config.input.port.interval(),
    );

    let mut senders = Vec::with_capacity(config.outputs.len());
    let mut links = Vec::with_capacity(config.outputs.len());
    for (index, output) in config.outputs.iter().enumerate() {
        let link = SerialLink::open(&output.device, &config.output_serial(index))?;
        let flow: Box<dyn FlowInput> = if output.flow_control {
            Box::new(link.flow_input()?)
        } else {
            Box::new(NullLine::asserted())
        };
        senders.push(SenderPort::new(
            index + 1,
            reader_config.telegram_size,
            output.port.enabled,
            output.port.interval(),
        ));
        links.push(SenderLink {
            outbound: Box::new(link),
            flow,
        });
    }

    start(Splitter::new(receiver, senders), links, config.flow_poll())
}

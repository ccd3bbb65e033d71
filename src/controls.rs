use anyhow::Result;
use std::io::BufRead;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::pipeline::Pipeline;

/// A console command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    /// Enable or disable the bot; enabling acknowledges an alert
    Toggle,
    Recalibrate,
    /// Print capture status and the store as JSON
    Status,
    /// Save the current minimap with overlays
    Debug,
    Quit,
}

impl Control {
    pub fn parse(line: &str) -> Option<Control> {
        match line.trim().to_ascii_lowercase().as_str() {
            "t" | "toggle" => Some(Control::Toggle),
            "r" | "recalibrate" => Some(Control::Recalibrate),
            "s" | "status" => Some(Control::Status),
            "d" | "debug" => Some(Control::Debug),
            "q" | "quit" => Some(Control::Quit),
            _ => None,
        }
    }
}

/// Carry out `control`. Returns false once the program should exit.
pub fn apply(control: Control, pipeline: &Pipeline) -> bool {
    match control {
        Control::Toggle => {
            pipeline.state().toggle_enabled();
        }
        Control::Recalibrate => {
            info!("Recalibrating minimap");
            pipeline.request_recalibration();
        }
        Control::Status => {
            println!("{:#}", pipeline.status_json());
        }
        Control::Debug => {
            if let Err(e) = pipeline.save_debug_minimap() {
                warn!("{:#}", e);
            }
        }
        Control::Quit => return false,
    }
    true
}

/// Forward lines from `reader` on a detached thread outside the runtime.
/// The channel closes at end of input.
fn spawn_line_reader<R>(reader: R) -> mpsc::UnboundedReceiver<std::io::Result<String>>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in reader.lines() {
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// Read console commands from stdin until `q` or Ctrl-C
pub async fn listen(pipeline: &Pipeline) -> Result<()> {
    println!("Controls: t = toggle bot, r = recalibrate, s = status, d = save minimap, q = quit");

    let mut lines = spawn_line_reader(std::io::BufReader::new(std::io::stdin()));
    loop {
        tokio::select! {
            line = lines.recv() => {
                let Some(line) = line.transpose()? else {
                    info!("Console closed, Ctrl-C to quit");
                    tokio::signal::ctrl_c().await?;
                    return Ok(());
                };
                match Control::parse(&line) {
                    Some(control) => {
                        if !apply(control, pipeline) {
                            return Ok(());
                        }
                    }
                    None if line.trim().is_empty() => {}
                    None => warn!("Unknown control {:?}", line.trim()),
                }
            }
            signal = tokio::signal::ctrl_c() => {
                signal?;
                info!("Interrupted");
                return Ok(());
            }
        }
    }
}

use log::{debug, info};
use std::fmt;
use std::io::{self, Write};
use std::sync::mpsc::Sender;
use std::thread;
use std::time::Duration;

use northbridge_ios::{BlockStore, BootError, BootSource, BusProtocolEngine, ControlLine, TickSource,
                      VirtualBus};

/// One line of a replay script, acted out by the virtual host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptCommand {
    Store(u8),
    Write(Vec<u8>),
    WriteCount(usize),
    Read(usize),
    Serial(usize),
    Ack,
    Input(String),
    Sleep(u64),
    Boot,
}

#[derive(Debug, PartialEq, Eq)]
pub struct ScriptError {
    pub line: usize,
    pub message: String,
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

fn parse_hex(word: &str) -> Result<u8, String> {
    let digits = word.strip_prefix("0x").or_else(|| word.strip_prefix("0X")).unwrap_or(word);
    u8::from_str_radix(digits, 16).map_err(|_| format!("'{}' is not a hex byte", word))
}

fn parse_count(word: Option<&str>, default: usize) -> Result<usize, String> {
    match word {
        None => Ok(default),
        Some(w) => w.parse().map_err(|_| format!("'{}' is not a count", w)),
    }
}

fn parse_line(line: &str) -> Result<Option<ScriptCommand>, String> {
    let line = match line.find('#') {
        Some(i) => &line[..i],
        None => line,
    };
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (keyword, rest) = match line.split_once(char::is_whitespace) {
        Some((keyword, rest)) => (keyword, rest.trim()),
        None => (line, ""),
    };
    let mut words = rest.split_whitespace();
    let command = match keyword {
        "store" => ScriptCommand::Store(parse_hex(words.next().ok_or("store needs an opcode")?)?),
        "write" => {
            let bytes = words.map(parse_hex).collect::<Result<Vec<_>, _>>()?;
            if bytes.is_empty() {
                return Err("write needs at least one byte".to_string());
            }
            return Ok(Some(ScriptCommand::Write(bytes)));
        }
        "write-count" => ScriptCommand::WriteCount(
            parse_count(Some(words.next().ok_or("write-count needs a count")?), 0)?),
        "read" => ScriptCommand::Read(parse_count(words.next(), 1)?),
        "serial" => ScriptCommand::Serial(parse_count(words.next(), 1)?),
        "ack" => ScriptCommand::Ack,
        "input" => return Ok(Some(ScriptCommand::Input(rest.to_string()))),
        "sleep" => ScriptCommand::Sleep(
            parse_count(Some(words.next().ok_or("sleep needs a duration")?), 0)? as u64),
        "boot" => ScriptCommand::Boot,
        other => return Err(format!("unknown command '{}'", other)),
    };
    if let Some(extra) = words.next() {
        return Err(format!("unexpected '{}'", extra));
    }
    Ok(Some(command))
}

/// Parse a whole script. `#` starts a comment; blank lines are skipped.
pub fn parse_script(text: &str) -> Result<Vec<ScriptCommand>, ScriptError> {
    let mut commands = Vec::new();
    for (i, line) in text.lines().enumerate() {
        match parse_line(line) {
            Ok(Some(command)) => commands.push(command),
            Ok(None) => {}
            Err(message) => return Err(ScriptError { line: i + 1, message }),
        }
    }
    Ok(commands)
}

/// Plays the host's side of the bus against an engine.
pub struct Replay<'a, B, T, W> {
    engine: &'a mut BusProtocolEngine<VirtualBus, B, T>,
    serial_tx: Sender<u8>,
    boot_source: Result<BootSource, BootError>,
    output: W,
}

impl<'a, B: BlockStore, T: TickSource, W: Write> Replay<'a, B, T, W> {
    pub fn new(engine: &'a mut BusProtocolEngine<VirtualBus, B, T>,
               serial_tx: Sender<u8>,
               boot_source: Result<BootSource, BootError>,
               output: W) -> Self {
        Replay { engine, serial_tx, boot_source, output }
    }

    /// Poll until the engine has serviced the cycle the host just presented.
    fn complete_cycle(&mut self) -> Result<(), String> {
        if self.engine.poll().is_none() || self.engine.signals().is_waiting() {
            return Err("the engine left the host waiting".to_string());
        }
        Ok(())
    }

    fn read_cycles(&mut self, count: usize, address_bit: bool) -> Result<Vec<u8>, String> {
        let mut bytes = Vec::with_capacity(count);
        for _ in 0..count {
            self.engine.signals_mut().present_read(address_bit);
            self.complete_cycle()?;
            let byte = self.engine.signals_mut().take_latched()
                .ok_or("the host latched nothing")?;
            bytes.push(byte);
        }
        Ok(bytes)
    }

    fn write_cycles(&mut self, bytes: impl IntoIterator<Item = u8>) -> Result<(), String> {
        for b in bytes {
            self.engine.signals_mut().present_write(false, b);
            self.complete_cycle()?;
        }
        Ok(())
    }

    fn print_bytes(&mut self, label: &str, bytes: &[u8]) -> io::Result<()> {
        for (i, line) in bytes.chunks(16).enumerate() {
            let hex: Vec<String> = line.iter().map(|b| format!("{:02X}", b)).collect();
            let prefix = if i == 0 { label } else { "" };
            writeln!(self.output, "{:<8}{}", prefix, hex.join(" "))?;
        }
        Ok(())
    }

    fn execute(&mut self, command: &ScriptCommand) -> Result<(), String> {
        let io_err = |e: io::Error| format!("Failed to write output: {}", e);
        match command {
            ScriptCommand::Store(opcode) => {
                self.engine.signals_mut().present_write(true, *opcode);
                self.complete_cycle()?;
            }
            ScriptCommand::Write(bytes) => self.write_cycles(bytes.iter().copied())?,
            ScriptCommand::WriteCount(count) => self.write_cycles((1..=*count).map(|i| i as u8))?,
            ScriptCommand::Read(count) => {
                let bytes = self.read_cycles(*count, false)?;
                self.print_bytes("read:", &bytes).map_err(io_err)?;
            }
            ScriptCommand::Serial(count) => {
                let bytes = self.read_cycles(*count, true)?;
                self.print_bytes("serial:", &bytes).map_err(io_err)?;
            }
            ScriptCommand::Ack => {
                self.engine.signals_mut().present_interrupt_ack();
                self.complete_cycle()?;
            }
            ScriptCommand::Input(text) => {
                for b in text.bytes() {
                    self.serial_tx.send(b).map_err(|_| "serial console is gone".to_string())?;
                }
                self.engine.poll();
            }
            ScriptCommand::Sleep(millis) => {
                thread::sleep(Duration::from_millis(*millis));
                self.engine.poll();
            }
            ScriptCommand::Boot => {
                let source = self.boot_source.as_ref().map_err(|e| e.to_string())?;
                let loaded = self.engine.boot(source).map_err(|e| e.to_string())?;
                writeln!(self.output, "boot:   {} bytes of {}", loaded, source).map_err(io_err)?;
            }
        }
        Ok(())
    }

    /// Run every command in order, stopping at the first failure.
    pub fn run(&mut self, commands: &[ScriptCommand]) -> Result<(), String> {
        info!("Replaying {} commands.", commands.len());
        for (i, command) in commands.iter().enumerate() {
            debug!("Command {}: {:?}", i + 1, command);
            self.execute(command).map_err(|e| format!("command {} ({:?}): {}", i + 1, command, e))?;
        }
        if self.engine.signals().line(ControlLine::Interrupt) {
            writeln!(self.output, "note:   interrupt line still asserted")
                .map_err(|e| format!("Failed to write output: {}", e))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use northbridge_ios::{BiosSettings, BootMode, ClockMode, HostTicks, MemoryBlockStore, Peripherals,
                          SerialConsole};
    use std::sync::mpsc;

    #[test]
    fn test_parse_script() {
        let script = "\
# Select disk 3.
store 09
write 0x03   # trailing comment

write-count 4
read
read 7
serial 2
ack
input hello world
sleep 10
boot
";
        assert_eq!(parse_script(script), Ok(vec![
            ScriptCommand::Store(0x09),
            ScriptCommand::Write(vec![0x03]),
            ScriptCommand::WriteCount(4),
            ScriptCommand::Read(1),
            ScriptCommand::Read(7),
            ScriptCommand::Serial(2),
            ScriptCommand::Ack,
            ScriptCommand::Input("hello world".to_string()),
            ScriptCommand::Sleep(10),
            ScriptCommand::Boot,
        ]));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(parse_script("store\n").unwrap_err().line, 1);
        assert_eq!(parse_script("read\nwrite 100\n").unwrap_err(), ScriptError {
            line: 2,
            message: "'100' is not a hex byte".to_string(),
        });
        assert!(parse_script("write\n").is_err());
        assert!(parse_script("ack now\n").is_err());
        assert!(parse_script("jump 00\n").is_err());
    }

    #[test]
    fn test_replay_against_engine() {
        let (serial_tx, serial_rx) = mpsc::channel();
        let peripherals = Peripherals::absent()
            .with_serial(Box::new(SerialConsole::new(serial_rx, io::sink())));
        let store = MemoryBlockStore::new().with_file("DS0N00.DSK", vec![0; 4096]);
        let mut engine = BusProtocolEngine::new(
            VirtualBus::new(), store, peripherals, &BiosSettings::default(), HostTicks::new());

        let script = parse_script("\
store 87
read
store 09
write 00
store 0A
write 00 00
store 0B
write 02
store 0C
write-count 512
store 0B
write 02
store 86
read 3
store 85
read
input A
serial 2
").unwrap();
        let mut output = Vec::new();
        let boot_source = BootSource::for_settings(&BiosSettings::default(), None);
        Replay::new(&mut engine, serial_tx, boot_source, &mut output).run(&script).unwrap();
        assert_eq!(String::from_utf8(output).unwrap(),
                   "read:   00\nread:   01 02 03\nread:   00\nserial: 41 FF\n");
    }

    #[test]
    fn test_boot_reports_missing_image() {
        let (serial_tx, _serial_rx) = mpsc::channel();
        let settings = BiosSettings::new(ClockMode::Fast, 0, false, BootMode::ILoad);
        let mut engine = BusProtocolEngine::new(
            VirtualBus::new(), MemoryBlockStore::new(), Peripherals::absent(),
            &settings, HostTicks::new());
        let boot_source = BootSource::for_settings(&settings, None);
        let expected = boot_source.clone().unwrap_err().to_string();
        assert!(expected.starts_with("No boot image"));

        let result = Replay::new(&mut engine, serial_tx, boot_source, io::sink())
            .run(&[ScriptCommand::Boot]);
        assert!(result.unwrap_err().ends_with(&expected));
    }

    #[test]
    fn test_boot_embedded_image() {
        let (serial_tx, _serial_rx) = mpsc::channel();
        let settings = BiosSettings::new(ClockMode::Fast, 0, false, BootMode::ILoad);
        let mut engine = BusProtocolEngine::new(
            VirtualBus::new(), MemoryBlockStore::new(), Peripherals::absent(),
            &settings, HostTicks::new());
        let boot_source = BootSource::for_settings(&settings, Some(vec![0x00, 0x76]));
        let mut output = Vec::new();
        Replay::new(&mut engine, serial_tx, boot_source, &mut output)
            .run(&[ScriptCommand::Boot]).unwrap();
        assert_eq!(String::from_utf8(output).unwrap(),
                   "boot:   2 bytes of built-in image (2 bytes)\n");
    }
}

// Write opcodes.
pub const OP_USRLED: u8 = 0x00;
pub const OP_SERTX: u8 = 0x01;
pub const OP_GPIOA_WRITE: u8 = 0x03;
pub const OP_GPIOB_WRITE: u8 = 0x04;
pub const OP_IODIRA: u8 = 0x05;
pub const OP_IODIRB: u8 = 0x06;
pub const OP_GPPUA: u8 = 0x07;
pub const OP_GPPUB: u8 = 0x08;
pub const OP_SELDSK: u8 = 0x09;
pub const OP_SELTRK: u8 = 0x0A;
pub const OP_SELSCT: u8 = 0x0B;
pub const OP_WRTSCT: u8 = 0x0C;
pub const OP_SETBNK: u8 = 0x0D;
pub const OP_SETIRQ: u8 = 0x0E;
pub const OP_SETTICK: u8 = 0x0F;
pub const OP_SETSPP: u8 = 0x10;
pub const OP_WRSPP: u8 = 0x11;
pub const OP_SPEAKR: u8 = 0x12;

// Read opcodes.
pub const OP_USRKEY: u8 = 0x80;
pub const OP_GPIOA_READ: u8 = 0x81;
pub const OP_GPIOB_READ: u8 = 0x82;
pub const OP_SYSFLG: u8 = 0x83;
pub const OP_DATTME: u8 = 0x84;
pub const OP_ERRDSK: u8 = 0x85;
pub const OP_RDSECT: u8 = 0x86;
pub const OP_SDMNT: u8 = 0x87;
pub const OP_ATXBUF: u8 = 0x88;
pub const OP_SYSIRQ: u8 = 0x89;
pub const OP_GETSPP: u8 = 0x8A;
pub const OP_CARDS: u8 = 0x8B;

/// The idle opcode. Nothing executes while it is stored.
pub const OP_NOP: u8 = 0xFF;

/// Handlers for the Execute-Write phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteCommand {
    UserLed,
    SerialTx,
    GpioA,
    GpioB,
    IoDirA,
    IoDirB,
    PullUpA,
    PullUpB,
    SelectDisk,
    SelectTrack,
    SelectSector,
    WriteSector,
    SetBank,
    SetIrq,
    SetTick,
    InitParallel,
    WriteParallel,
    Speaker,
}

/// Handlers for the Execute-Read phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadCommand {
    UserKey,
    GpioA,
    GpioB,
    SystemFlags,
    DateTime,
    DiskError,
    ReadSector,
    Mount,
    TxFree,
    IrqStatus,
    ParallelStatus,
    Cards,
}

/// What a stored opcode means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Write(WriteCommand),
    Read(ReadCommand),
    Nop,
}

impl Command {
    /// Does the stored command survive an Execute-Write? Only the multi-byte
    /// write commands do; everything else reverts to NOP.
    pub fn stays_armed_after_write(self) -> bool {
        matches!(self,
            Command::Write(WriteCommand::SelectTrack)
            | Command::Write(WriteCommand::WriteSector))
    }

    /// Does the stored command survive an Execute-Read?
    pub fn stays_armed_after_read(self) -> bool {
        matches!(self,
            Command::Read(ReadCommand::DateTime)
            | Command::Read(ReadCommand::ReadSector))
    }
}

const fn decode(opcode: u8) -> Command {
    use Command::{Nop, Read, Write};
    match opcode {
        OP_USRLED => Write(WriteCommand::UserLed),
        OP_SERTX => Write(WriteCommand::SerialTx),
        OP_GPIOA_WRITE => Write(WriteCommand::GpioA),
        OP_GPIOB_WRITE => Write(WriteCommand::GpioB),
        OP_IODIRA => Write(WriteCommand::IoDirA),
        OP_IODIRB => Write(WriteCommand::IoDirB),
        OP_GPPUA => Write(WriteCommand::PullUpA),
        OP_GPPUB => Write(WriteCommand::PullUpB),
        OP_SELDSK => Write(WriteCommand::SelectDisk),
        OP_SELTRK => Write(WriteCommand::SelectTrack),
        OP_SELSCT => Write(WriteCommand::SelectSector),
        OP_WRTSCT => Write(WriteCommand::WriteSector),
        OP_SETBNK => Write(WriteCommand::SetBank),
        OP_SETIRQ => Write(WriteCommand::SetIrq),
        OP_SETTICK => Write(WriteCommand::SetTick),
        OP_SETSPP => Write(WriteCommand::InitParallel),
        OP_WRSPP => Write(WriteCommand::WriteParallel),
        OP_SPEAKR => Write(WriteCommand::Speaker),
        OP_USRKEY => Read(ReadCommand::UserKey),
        OP_GPIOA_READ => Read(ReadCommand::GpioA),
        OP_GPIOB_READ => Read(ReadCommand::GpioB),
        OP_SYSFLG => Read(ReadCommand::SystemFlags),
        OP_DATTME => Read(ReadCommand::DateTime),
        OP_ERRDSK => Read(ReadCommand::DiskError),
        OP_RDSECT => Read(ReadCommand::ReadSector),
        OP_SDMNT => Read(ReadCommand::Mount),
        OP_ATXBUF => Read(ReadCommand::TxFree),
        OP_SYSIRQ => Read(ReadCommand::IrqStatus),
        OP_GETSPP => Read(ReadCommand::ParallelStatus),
        OP_CARDS => Read(ReadCommand::Cards),
        _ => Nop,
    }
}

const fn build_table() -> [Command; 256] {
    let mut table = [Command::Nop; 256];
    let mut i = 0;
    while i < 256 {
        table[i] = decode(i as u8);
        i += 1;
    }
    table
}

/// Every opcode byte mapped to its handler.
static DISPATCH_TABLE: [Command; 256] = build_table();

pub fn lookup(opcode: u8) -> Command {
    DISPATCH_TABLE[opcode as usize]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_agrees_with_decode() {
        for op in 0..=u8::MAX {
            assert_eq!(lookup(op), decode(op));
        }
    }

    #[test]
    fn test_unassigned_opcodes_are_nop() {
        for op in [0x02, 0x13, 0x7F, 0x8C, 0xFE, OP_NOP] {
            assert_eq!(lookup(op), Command::Nop);
        }
    }

    #[test]
    fn test_directions() {
        for op in OP_USRLED..=OP_SPEAKR {
            if op != 0x02 {
                assert!(matches!(lookup(op), Command::Write(_)), "{:#04x}", op);
            }
        }
        for op in OP_USRKEY..=OP_CARDS {
            assert!(matches!(lookup(op), Command::Read(_)), "{:#04x}", op);
        }
    }

    #[test]
    fn test_armed_opcodes() {
        let after_write: Vec<u8> = (0..=u8::MAX)
            .filter(|&op| lookup(op).stays_armed_after_write())
            .collect();
        assert_eq!(after_write, vec![OP_SELTRK, OP_WRTSCT]);
        let after_read: Vec<u8> = (0..=u8::MAX)
            .filter(|&op| lookup(op).stays_armed_after_read())
            .collect();
        assert_eq!(after_read, vec![OP_DATTME, OP_RDSECT]);
    }
}

use crate::segment::Header;
use crate::seqnum::SeqNum;

pub const HEADER_SIZE: usize = 20;

// Data offset of an option-less header, in 32-bit words
const DATA_OFFSET_WORDS: u8 = (HEADER_SIZE / 4) as u8;

const FLAG_FIN: u8 = 0x01;
const FLAG_SYN: u8 = 0x02;
const FLAG_RST: u8 = 0x04;
const FLAG_PSH: u8 = 0x08;
const FLAG_ACK: u8 = 0x10;
const FLAG_URG: u8 = 0x20;

/// Big-endian reader over a buffer whose length has already been checked by the caller.
pub struct Reader<'a> {
    buffer: &'a [u8],
    bytes_read: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buffer: &'a [u8]) -> Self {
        Self {
            buffer,
            bytes_read: 0,
        }
    }

    pub fn bytes_read(&self) -> usize {
        self.bytes_read
    }

    fn take<const N: usize>(&mut self) -> [u8; N] {
        let mut bytes = [0; N];
        bytes.copy_from_slice(&self.buffer[self.bytes_read..self.bytes_read + N]);
        self.bytes_read += N;
        bytes
    }

    pub fn read_u8(&mut self) -> u8 {
        u8::from_be_bytes(self.take())
    }

    pub fn read_u16(&mut self) -> u16 {
        u16::from_be_bytes(self.take())
    }

    pub fn read_u32(&mut self) -> u32 {
        u32::from_be_bytes(self.take())
    }
}

/// Big-endian writer over a buffer whose length has already been checked by the caller.
pub struct Writer<'a> {
    buffer: &'a mut [u8],
    bytes_written: usize,
}

impl<'a> Writer<'a> {
    pub fn new(buffer: &'a mut [u8]) -> Self {
        Self {
            buffer,
            bytes_written: 0,
        }
    }

    pub fn bytes_written(&self) -> usize {
        self.bytes_written
    }

    pub fn write_slice(&mut self, bytes: &[u8]) {
        self.buffer[self.bytes_written..self.bytes_written + bytes.len()].copy_from_slice(bytes);
        self.bytes_written += bytes.len();
    }

    pub fn write_u8(&mut self, value: u8) {
        self.write_slice(&value.to_be_bytes());
    }

    pub fn write_u16(&mut self, value: u16) {
        self.write_slice(&value.to_be_bytes());
    }

    pub fn write_u32(&mut self, value: u32) {
        self.write_slice(&value.to_be_bytes());
    }
}

/// A type with a fixed-size wire representation.
pub trait BlockSerial {
    const SIZE: usize;

    /// Reads an object. `rd` is guaranteed to hold at least `SIZE` bytes.
    fn read(rd: &mut Reader) -> Option<Self>
    where
        Self: Sized;

    /// Writes an object. `wr` is guaranteed to have room for `SIZE` bytes.
    fn write(wr: &mut Writer, obj: &Self);
}

pub trait Serial {
    fn read(buffer: &[u8]) -> Option<(Self, usize)>
    where
        Self: Sized;

    fn write(buffer: &mut [u8], obj: &Self) -> Option<usize>;
}

impl<T> Serial for T
where
    T: BlockSerial,
{
    fn read(buffer: &[u8]) -> Option<(Self, usize)> {
        if buffer.len() < T::SIZE {
            return None;
        }

        let rd = &mut Reader::new(buffer);

        let obj = T::read(rd)?;

        debug_assert_eq!(rd.bytes_read(), T::SIZE);

        Some((obj, rd.bytes_read()))
    }

    fn write(buffer: &mut [u8], obj: &Self) -> Option<usize> {
        if buffer.len() < T::SIZE {
            return None;
        }

        let mut wr = Writer::new(buffer);

        T::write(&mut wr, obj);

        debug_assert_eq!(wr.bytes_written(), T::SIZE);

        Some(wr.bytes_written())
    }
}

impl BlockSerial for Header {
    const SIZE: usize = HEADER_SIZE;

    fn read(rd: &mut Reader) -> Option<Self> {
        let sport = rd.read_u16();
        let dport = rd.read_u16();
        let seqno = rd.read_u32();
        let ackno = rd.read_u32();
        let offset = rd.read_u8() >> 4;
        let flags = rd.read_u8();
        let win = rd.read_u16();
        let _checksum = rd.read_u16();
        let _urgent = rd.read_u16();

        // Options are not supported
        if offset != DATA_OFFSET_WORDS {
            return None;
        }

        Some(Self {
            sport,
            dport,
            seqno: SeqNum(seqno),
            ackno: SeqNum(ackno),
            urg: flags & FLAG_URG != 0,
            ack: flags & FLAG_ACK != 0,
            psh: flags & FLAG_PSH != 0,
            rst: flags & FLAG_RST != 0,
            syn: flags & FLAG_SYN != 0,
            fin: flags & FLAG_FIN != 0,
            win,
        })
    }

    fn write(wr: &mut Writer, obj: &Self) {
        let mut flags = 0;

        for (set, bit) in [
            (obj.urg, FLAG_URG),
            (obj.ack, FLAG_ACK),
            (obj.psh, FLAG_PSH),
            (obj.rst, FLAG_RST),
            (obj.syn, FLAG_SYN),
            (obj.fin, FLAG_FIN),
        ] {
            if set {
                flags |= bit;
            }
        }

        wr.write_u16(obj.sport);
        wr.write_u16(obj.dport);
        wr.write_u32(obj.seqno.raw_value());
        wr.write_u32(obj.ackno.raw_value());
        wr.write_u8(DATA_OFFSET_WORDS << 4);
        wr.write_u8(flags);
        wr.write_u16(obj.win);
        // Checksum is left to the carrier
        wr.write_u16(0);
        wr.write_u16(0);
    }
}

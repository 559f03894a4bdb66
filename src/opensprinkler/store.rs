//! Non-volatile byte store
//!
//! Everything that must survive a power cycle lives at a fixed address of a small byte-addressable
//! device (an EEPROM on the AVR boards, an image file on Linux). The addresses are listed
//! in [layout]. Reads never fail because both backends keep the full image in memory; writes go
//! through to the medium immediately.

use byteorder::{ByteOrder, LittleEndian};
use core::fmt;
use std::{
    error,
    fs::{File, OpenOptions},
    io::{self, Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
    sync::Arc,
};

/// Value of an erased (never written) byte
pub const ERASED: u8 = 0xFF;

/// Fixed addresses of every persisted region
///
/// Changing this layout without migrating existing images corrupts stored values.
pub mod layout {
    use crate::opensprinkler::station::{MAX_NUM_BOARDS, MAX_NUM_STATIONS, STATION_NAME_SIZE};

    /// Total size of the device (bytes)
    pub const DEVICE_SIZE: usize = 2048;

    /// Option values, one byte each
    pub const OPTIONS: usize = 0x0000;
    pub const OPTIONS_SIZE: usize = 48;

    /// Controller status word (u16, little endian)
    pub const CONTROLLER_STATUS: usize = 0x0030;

    /// Rain delay stop time (u32 seconds since epoch, little endian). `0` means no rain delay.
    pub const RAIN_DELAY_STOP: usize = 0x0034;

    /// MD5 digest of the device password
    pub const PASSWORD: usize = 0x0040;
    pub const PASSWORD_SIZE: usize = 16;

    /// Station names, [STATION_NAME_SIZE] bytes per station (NUL terminated)
    pub const STATION_NAMES: usize = 0x0050;

    /// Master operation bits, one byte per board
    pub const MASTER_OPERATION: usize = STATION_NAMES + MAX_NUM_STATIONS * STATION_NAME_SIZE;

    /// Ignore rain bits, one byte per board
    pub const IGNORE_RAIN: usize = MASTER_OPERATION + MAX_NUM_BOARDS;

    /// Station disabled bits, one byte per board
    pub const STATION_DISABLED: usize = IGNORE_RAIN + MAX_NUM_BOARDS;

    /// Station attribute byte (group and type), one byte per station
    pub const STATION_ATTRIB: usize = STATION_DISABLED + MAX_NUM_BOARDS;

    /// First unused address
    pub const END: usize = STATION_ATTRIB + MAX_NUM_STATIONS;

    const _: () = assert!(CONTROLLER_STATUS >= OPTIONS + OPTIONS_SIZE);
    const _: () = assert!(STATION_NAMES >= PASSWORD + PASSWORD_SIZE);
    const _: () = assert!(END <= DEVICE_SIZE);
}

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Clone, Debug)]
#[non_exhaustive]
pub enum Error {
    Io(Arc<io::Error>),
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::Io(Arc::new(err))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(err) => write!(f, "Store I/O error: {}", err),
        }
    }
}

impl error::Error for Error {}

/// Panics if `address..address + len` is not inside the device.
///
/// Addresses come from [layout], so an access outside the device is a programming error.
fn check_bounds(size: usize, address: usize, len: usize) {
    assert!(
        address.checked_add(len).map_or(false, |end| end <= size),
        "Store access {:#06x}+{} is outside of the {} byte device",
        address,
        len,
        size
    );
}

pub trait Store {
    /// Device size (bytes)
    fn size(&self) -> usize;

    fn read_block(&self, address: usize, buf: &mut [u8]);

    fn write_block(&mut self, address: usize, data: &[u8]) -> Result<()>;

    fn read(&self, address: usize) -> u8 {
        let mut buf = [0u8; 1];
        self.read_block(address, &mut buf);
        buf[0]
    }

    fn write(&mut self, address: usize, value: u8) -> Result<()> {
        self.write_block(address, &[value])
    }

    fn read_u16(&self, address: usize) -> u16 {
        let mut buf = [0u8; 2];
        self.read_block(address, &mut buf);
        LittleEndian::read_u16(&buf)
    }

    fn write_u16(&mut self, address: usize, value: u16) -> Result<()> {
        let mut buf = [0u8; 2];
        LittleEndian::write_u16(&mut buf, value);
        self.write_block(address, &buf)
    }

    fn read_u32(&self, address: usize) -> u32 {
        let mut buf = [0u8; 4];
        self.read_block(address, &mut buf);
        LittleEndian::read_u32(&buf)
    }

    fn write_u32(&mut self, address: usize, value: u32) -> Result<()> {
        let mut buf = [0u8; 4];
        LittleEndian::write_u32(&mut buf, value);
        self.write_block(address, &buf)
    }

    /// Read a NUL terminated string from a field of `width` bytes
    fn read_string(&self, address: usize, width: usize) -> String {
        let mut buf = vec![0u8; width];
        self.read_block(address, &mut buf);
        let len = buf.iter().position(|&b| b == 0).unwrap_or(width);
        String::from_utf8_lossy(&buf[..len]).into_owned()
    }

    /// Write a string into a field of `width` bytes
    ///
    /// The text is truncated (on a character boundary) to `width - 1` bytes and the rest of the
    /// field is zero filled, so the write never touches the following field.
    fn write_string(&mut self, address: usize, width: usize, text: &str) -> Result<()> {
        let mut end = text.len().min(width.saturating_sub(1));
        while !text.is_char_boundary(end) {
            end -= 1;
        }

        let mut buf = vec![0u8; width];
        buf[..end].copy_from_slice(&text.as_bytes()[..end]);
        self.write_block(address, &buf)
    }
}

/// Volatile store (used by tests and the demo build)
#[derive(Clone)]
pub struct MemoryStore {
    image: Vec<u8>,
}

impl MemoryStore {
    /// Create an erased device of `size` bytes
    pub fn new(size: usize) -> Self {
        Self { image: vec![ERASED; size] }
    }

    pub fn from_image(image: Vec<u8>) -> Self {
        Self { image }
    }

    pub fn image(&self) -> &[u8] {
        &self.image
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(layout::DEVICE_SIZE)
    }
}

impl Store for MemoryStore {
    fn size(&self) -> usize {
        self.image.len()
    }

    fn read_block(&self, address: usize, buf: &mut [u8]) {
        check_bounds(self.size(), address, buf.len());
        buf.copy_from_slice(&self.image[address..address + buf.len()]);
    }

    fn write_block(&mut self, address: usize, data: &[u8]) -> Result<()> {
        check_bounds(self.size(), address, data.len());
        self.image[address..address + data.len()].copy_from_slice(data);
        Ok(())
    }
}

/// Store backed by an image file
///
/// The whole image is read on open. Every write updates the in-memory copy, then the modified range
/// is written to the file and synced before returning.
pub struct FileStore {
    path: PathBuf,
    file: File,
    image: Vec<u8>,
}

impl FileStore {
    /// Open (or create) an image file of `size` bytes
    ///
    /// A missing or short file is padded with [ERASED] bytes.
    pub fn open<P: AsRef<Path>>(path: P, size: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = OpenOptions::new().read(true).write(true).create(true).open(&path)?;

        let mut image = Vec::with_capacity(size);
        file.read_to_end(&mut image)?;

        if image.len() < size {
            let existing = image.len();
            tracing::debug!("Extending store image {} from {} to {} bytes", path.display(), existing, size);
            image.resize(size, ERASED);
            file.seek(SeekFrom::Start(existing as u64))?;
            file.write_all(&image[existing..])?;
            file.sync_data()?;
        }
        image.truncate(size);

        Ok(Self { path, file, image })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Store for FileStore {
    fn size(&self) -> usize {
        self.image.len()
    }

    fn read_block(&self, address: usize, buf: &mut [u8]) {
        check_bounds(self.size(), address, buf.len());
        buf.copy_from_slice(&self.image[address..address + buf.len()]);
    }

    fn write_block(&mut self, address: usize, data: &[u8]) -> Result<()> {
        check_bounds(self.size(), address, data.len());
        tracing::trace!("Store write {:#06x}+{}", address, data.len());

        self.image[address..address + data.len()].copy_from_slice(data);
        self.file.seek(SeekFrom::Start(address as u64))?;
        self.file.write_all(data)?;
        self.file.sync_data()?;
        Ok(())
    }
}

use core::fmt;
use std::error;

use super::{gpio, store};

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    StoreError(store::Error),

    GpioError(gpio::Error),
}

impl From<store::Error> for Error {
    fn from(err: store::Error) -> Self {
        Error::StoreError(err)
    }
}

impl From<gpio::Error> for Error {
    fn from(err: gpio::Error) -> Self {
        Error::GpioError(err)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::StoreError(err) => write!(f, "Store error: {}", err),

            Error::GpioError(err) => write!(f, "GPIO error: {}", err),
        }
    }
}

impl error::Error for Error {}

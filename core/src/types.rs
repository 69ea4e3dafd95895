//! Identifiers and value objects shared by the seat inventory and booking aggregates.

use crate::error::DomainError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(Uuid);

        impl $name {
            #[doc = concat!("Creates a new random `", stringify!($name), "`")]
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            #[doc = concat!("Create a `", stringify!($name), "` from a `Uuid`")]
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Get the inner UUID
            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id!(
    /// Unique identifier for a booking
    BookingId
);
uuid_id!(
    /// Unique identifier for a customer
    CustomerId
);
uuid_id!(
    /// Unique identifier for a showtime (one screening of a movie or event)
    ShowtimeId
);
uuid_id!(
    /// Unique identifier for a screen (auditorium)
    ScreenId
);
uuid_id!(
    /// Unique identifier for a seat inventory
    InventoryId
);
uuid_id!(
    /// Unique identifier for a ticket inside a booking
    TicketId
);

impl BookingId {
    /// First eight hex digits of the id, upper-cased.
    ///
    /// Used as the booking fragment of ticket codes.
    #[must_use]
    pub fn short_code(&self) -> String {
        self.0
            .simple()
            .to_string()
            .chars()
            .take(8)
            .collect::<String>()
            .to_ascii_uppercase()
    }
}

// ============================================================================
// Seat Numbers
// ============================================================================

/// Represents a physical seat on a screen (e.g., "A12", "VIP-5")
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SeatNumber(String);

impl SeatNumber {
    /// Creates a new `SeatNumber`, trimming surrounding whitespace
    #[must_use]
    pub fn new(number: impl Into<String>) -> Self {
        let number = number.into();
        Self(number.trim().to_string())
    }

    /// Returns the seat number as a string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Upper-cased seat number with every non-alphanumeric character removed.
    ///
    /// `"a-12"` and `"A 12"` both normalize to `"A12"`.
    #[must_use]
    pub fn normalized(&self) -> String {
        self.0
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .map(|c| c.to_ascii_uppercase())
            .collect()
    }
}

impl fmt::Display for SeatNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SeatNumber {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

// ============================================================================
// Money
// ============================================================================

/// Error returned when a currency code is not three ASCII letters.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid currency code '{0}': expected three ASCII letters")]
pub struct ParseCurrencyError(String);

/// ISO-4217 currency code (three upper-case letters)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Currency([u8; 3]);

impl Currency {
    /// Indonesian rupiah
    pub const IDR: Self = Self(*b"IDR");
    /// US dollar
    pub const USD: Self = Self(*b"USD");
    /// Euro
    pub const EUR: Self = Self(*b"EUR");

    /// Parse a currency code, accepting lower-case input.
    ///
    /// # Errors
    ///
    /// Returns [`ParseCurrencyError`] unless `code` is exactly three ASCII letters.
    pub fn parse(code: &str) -> Result<Self, ParseCurrencyError> {
        match code.trim().as_bytes() {
            [a, b, c] if [a, b, c].iter().all(|byte| byte.is_ascii_alphabetic()) => Ok(Self([
                a.to_ascii_uppercase(),
                b.to_ascii_uppercase(),
                c.to_ascii_uppercase(),
            ])),
            _ => Err(ParseCurrencyError(code.to_string())),
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{}", char::from(byte))?;
        }
        Ok(())
    }
}

impl TryFrom<String> for Currency {
    type Error = ParseCurrencyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Currency> for String {
    fn from(value: Currency) -> Self {
        value.to_string()
    }
}

/// An amount of money in minor units (cents, sen) of a single currency
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Money {
    minor: u64,
    currency: Currency,
}

impl Money {
    /// Creates a `Money` value from minor units
    #[must_use]
    pub const fn new(minor: u64, currency: Currency) -> Self {
        Self { minor, currency }
    }

    /// Zero in the given currency
    #[must_use]
    pub const fn zero(currency: Currency) -> Self {
        Self::new(0, currency)
    }

    /// Returns the amount in minor units
    #[must_use]
    pub const fn minor(&self) -> u64 {
        self.minor
    }

    /// Returns the currency
    #[must_use]
    pub const fn currency(&self) -> Currency {
        self.currency
    }

    /// Checks if the amount is zero
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.minor == 0
    }

    /// Adds two amounts of the same currency.
    ///
    /// # Errors
    ///
    /// - [`DomainError::CurrencyMismatch`] if the currencies differ
    /// - [`DomainError::AmountOverflow`] if the sum does not fit in `u64`
    pub fn checked_add(self, other: Self) -> Result<Self, DomainError> {
        if self.currency != other.currency {
            return Err(DomainError::CurrencyMismatch {
                expected: self.currency,
                found: other.currency,
            });
        }
        self.minor
            .checked_add(other.minor)
            .map(|minor| Self::new(minor, self.currency))
            .ok_or(DomainError::AmountOverflow)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}.{:02}", self.currency, self.minor / 100, self.minor % 100)
    }
}

// ============================================================================
// Artifacts
// ============================================================================

/// Reference to a stored artifact (QR image, invoice PDF), e.g. an object key or URL
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactRef(String);

impl ArtifactRef {
    /// Creates a new `ArtifactRef`
    #[must_use]
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    /// Returns the reference as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

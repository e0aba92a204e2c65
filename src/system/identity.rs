//! Persistent device identity
//!
//! Keeps the random static Bluetooth address in a reserved flash region using
//! the `sequential-storage` crate, so that hosts see the same device across
//! power cycles. The address is generated from the TRNG on first boot.
//!
//! The storage region sits at the end of flash, outside the program and the
//! radio firmware ranges declared in memory.x. Boot must not continue if the
//! region cannot be read or written.

use defmt::*;
use embassy_rp::flash::{Async, ERASE_SIZE, Flash};
use embassy_rp::trng::{self, Trng};
use sequential_storage::{
    cache::NoCache,
    map::{Key, SerializationError, Value, fetch_item, store_item},
};

use crate::system::resources::{IdentityResources, Irqs};

/// Total flash size of the board
pub const FLASH_SIZE: usize = 4 * 1024 * 1024;

/// Number of sectors used for storage (2 sectors for wear leveling)
const STORAGE_SECTOR_COUNT: usize = 2;

/// Total storage size
const STORAGE_SIZE: usize = ERASE_SIZE * STORAGE_SECTOR_COUNT;

/// Storage offset from the start of flash (last 8KB); must match memory.x
const STORAGE_OFFSET: u32 = (FLASH_SIZE - STORAGE_SIZE) as u32;

/// Bluetooth device address length
const ADDRESS_LEN: usize = 6;

/// Error raised by the identity store
pub type IdentityError = sequential_storage::Error<embassy_rp::flash::Error>;

/// Storage keys for sequential-storage
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
enum StorageKey {
    DeviceAddress = 0,
}

impl Key for StorageKey {
    fn serialize_into(&self, buffer: &mut [u8]) -> Result<usize, SerializationError> {
        if buffer.is_empty() {
            return Err(SerializationError::BufferTooSmall);
        }
        buffer[0] = *self as u8;
        Ok(1)
    }

    fn deserialize_from(buffer: &[u8]) -> Result<(Self, usize), SerializationError>
    where
        Self: Sized,
    {
        match buffer.first() {
            None => Err(SerializationError::BufferTooSmall),
            Some(0) => Ok((StorageKey::DeviceAddress, 1)),
            Some(_) => Err(SerializationError::InvalidFormat),
        }
    }
}

/// Random static device address, little-endian as sent over the air
#[derive(Debug, Clone, Copy, PartialEq, Eq, Format)]
pub struct DeviceAddress(pub [u8; ADDRESS_LEN]);

impl DeviceAddress {
    /// Turns random bytes into a valid static random address: the two most
    /// significant bits are set
    fn from_random(mut bytes: [u8; ADDRESS_LEN]) -> Self {
        bytes[ADDRESS_LEN - 1] |= 0xC0;
        Self(bytes)
    }
}

impl Value<'_> for DeviceAddress {
    fn serialize_into(&self, buffer: &mut [u8]) -> Result<usize, SerializationError> {
        if buffer.len() < ADDRESS_LEN {
            return Err(SerializationError::BufferTooSmall);
        }
        buffer[..ADDRESS_LEN].copy_from_slice(&self.0);
        Ok(ADDRESS_LEN)
    }

    fn deserialize_from(buffer: &[u8]) -> Result<Self, SerializationError>
    where
        Self: Sized,
    {
        let bytes: [u8; ADDRESS_LEN] = buffer
            .get(..ADDRESS_LEN)
            .and_then(|b| b.try_into().ok())
            .ok_or(SerializationError::BufferTooSmall)?;
        Ok(Self(bytes))
    }
}

/// Loads the stored device address, creating and persisting one on first boot
pub async fn load_or_create(r: IdentityResources) -> Result<DeviceAddress, IdentityError> {
    let mut flash = Flash::<_, Async, FLASH_SIZE>::new(r.flash, r.dma);
    let flash_range = STORAGE_OFFSET..(STORAGE_OFFSET + STORAGE_SIZE as u32);
    let mut cache = NoCache::new();
    let mut data_buffer = [0u8; 32];

    if let Some(address) = fetch_item::<StorageKey, DeviceAddress, _>(
        &mut flash,
        flash_range.clone(),
        &mut cache,
        &mut data_buffer,
        &StorageKey::DeviceAddress,
    )
    .await?
    {
        info!("Device address loaded: {:02x}", address.0);
        return Ok(address);
    }

    let mut trng = Trng::new(r.trng, Irqs, trng::Config::default());
    let mut bytes = [0u8; ADDRESS_LEN];
    trng.fill_bytes(&mut bytes).await;
    let address = DeviceAddress::from_random(bytes);

    store_item(
        &mut flash,
        flash_range,
        &mut cache,
        &mut data_buffer,
        &StorageKey::DeviceAddress,
        &address,
    )
    .await?;
    info!("Device address created: {:02x}", address.0);

    Ok(address)
}

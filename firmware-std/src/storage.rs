//! SD card storage over the ESP-IDF FAT VFS.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;

use esp_idf_svc::fs::fatfs::Fatfs;
use esp_idf_svc::hal::gpio::{AnyIOPin, InputPin, OutputPin};
use esp_idf_svc::hal::peripheral::Peripheral;
use esp_idf_svc::hal::sd::spi::SdSpiHostDriver;
use esp_idf_svc::hal::sd::{SdCardConfiguration, SdCardDriver};
use esp_idf_svc::hal::spi::config::DriverConfig;
use esp_idf_svc::hal::spi::{Dma, SpiAnyPins, SpiDriver};
use esp_idf_svc::io::vfs::MountedFatfs;

use espchain::board;
use espchain::radio::{Storage, StorageError};

/// Mounted card; unmounts on drop.
pub type SdMount =
    MountedFatfs<Fatfs<SdCardDriver<SdSpiHostDriver<'static, SpiDriver<'static>>>>>;

/// Mount the SD card at `mount_point`, clocked at `SD_SPI_FREQ_KHZ`.
pub fn mount(
    spi: impl Peripheral<P = impl SpiAnyPins> + 'static,
    sck: impl Peripheral<P = impl OutputPin> + 'static,
    mosi: impl Peripheral<P = impl OutputPin> + 'static,
    miso: impl Peripheral<P = impl InputPin> + 'static,
    cs: impl Peripheral<P = impl OutputPin> + 'static,
    mount_point: &str,
) -> anyhow::Result<SdMount> {
    let spi_driver = SpiDriver::new(
        spi,
        sck,
        mosi,
        Some(miso),
        &DriverConfig::default().dma(Dma::Auto(4096)),
    )?;
    let host = SdSpiHostDriver::new(
        spi_driver,
        Some(cs),
        AnyIOPin::none(),
        AnyIOPin::none(),
        AnyIOPin::none(),
        None,
    )?;
    let mut config = SdCardConfiguration::new();
    config.speed_khz = board::SD_SPI_FREQ_KHZ;
    let card = SdCardDriver::new_spi(host, &config)?;
    let mounted = MountedFatfs::mount(Fatfs::new_sdcard(0, card)?, mount_point, 4)?;
    log::info!(
        "SD card mounted at {} (CS {}, MOSI {}, SCK {}, MISO {}, {} kHz)",
        mount_point,
        board::SD_CS_PIN,
        board::SD_MOSI_PIN,
        board::SD_SCK_PIN,
        board::SD_MISO_PIN,
        board::SD_SPI_FREQ_KHZ,
    );
    Ok(mounted)
}

/// Capture storage rooted at the SD mount point.
///
/// Paths handed in by the engine are absolute within the card
/// (`/capture/...`). Without a card every operation fails with
/// `NotMounted` and captures are counted as failed.
pub struct SdStorage {
    root: &'static str,
    mounted: bool,
}

impl SdStorage {
    pub fn new(root: &'static str, mounted: bool) -> Self {
        Self { root, mounted }
    }

    fn full(&self, path: &str) -> String {
        format!("{}{}", self.root, path)
    }
}

impl Storage for SdStorage {
    type File = File;

    fn exists(&mut self, path: &str) -> bool {
        self.mounted && Path::new(&self.full(path)).exists()
    }

    fn mkdir(&mut self, path: &str) -> Result<(), StorageError> {
        if !self.mounted {
            return Err(StorageError::NotMounted);
        }
        fs::create_dir(self.full(path)).map_err(|e| {
            log::warn!("mkdir {}: {}", path, e);
            StorageError::Mkdir
        })
    }

    fn open_append(&mut self, path: &str) -> Result<File, StorageError> {
        if !self.mounted {
            return Err(StorageError::NotMounted);
        }
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.full(path))
            .map_err(|e| {
                log::warn!("open {}: {}", path, e);
                StorageError::Open
            })
    }

    fn write(&mut self, file: &mut File, bytes: &[u8]) -> Result<(), StorageError> {
        file.write_all(bytes).map_err(|_| StorageError::Write)
    }

    fn close(&mut self, mut file: File) -> Result<(), StorageError> {
        file.flush().map_err(|_| StorageError::Write)
    }
}

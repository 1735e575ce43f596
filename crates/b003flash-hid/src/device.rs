//! HID feature-report transport implementation
//!
//! Feature reports travel as class control transfers on endpoint zero: there
//! is no interrupt traffic in this protocol, the report slot itself is the
//! duplex channel.

use std::time::Duration;

use b003flash_core::error::{Error as CoreError, Result as CoreResult};
use b003flash_core::Transport;
use maybe_async::maybe_async;
use nusb::transfer::{ControlIn, ControlOut, ControlType, Recipient};
use nusb::{Device, Interface};

use crate::error::{HidError, Result};

/// Default USB vendor id of the rv003usb bootloader.
pub const DEFAULT_VID: u16 = 0x1209;

/// Default USB product id of the rv003usb bootloader.
pub const DEFAULT_PID: u16 = 0xB003;

/// HID class request: SET_REPORT.
const SET_REPORT: u8 = 0x09;

/// HID class request: GET_REPORT.
const GET_REPORT: u8 = 0x01;

/// Feature report type in the high byte of wValue.
const REPORT_TYPE_FEATURE: u16 = 3 << 8;

/// Interface number the bootloader exposes its HID collection on.
const HID_INTERFACE: u8 = 0;

/// USB HID feature-report transport for one bootloader device.
///
/// Construction records the (vendor id, product id) identity only; the
/// device itself is opened lazily by [`Transport::open`], which the session
/// engine also invokes on demand before a commit.
pub struct HidFeatureTransport {
    vid: u16,
    pid: u16,
    device: Option<(Device, Interface)>,
}

impl HidFeatureTransport {
    /// Create a transport for a specific USB identity.
    pub fn new(vid: u16, pid: u16) -> Self {
        Self {
            vid,
            pid,
            device: None,
        }
    }

    /// Create a transport for the default rv003usb bootloader identity.
    pub fn with_default_id() -> Self {
        Self::new(DEFAULT_VID, DEFAULT_PID)
    }

    fn open_device(&mut self) -> Result<()> {
        let info = nusb::list_devices()?
            .find(|d| d.vendor_id() == self.vid && d.product_id() == self.pid)
            .ok_or(HidError::DeviceNotFound {
                vid: self.vid,
                pid: self.pid,
            })?;

        log::info!(
            "opening bootloader {:04X}:{:04X} at bus {} address {}",
            self.vid,
            self.pid,
            info.bus_number(),
            info.device_address()
        );

        let device = info
            .open()
            .map_err(|e| HidError::OpenFailed(e.to_string()))?;

        // The OS HID driver owns the interface by default; take it over.
        let interface = device
            .detach_and_claim_interface(HID_INTERFACE)
            .map_err(|e| HidError::ClaimFailed(e.to_string()))?;

        self.device = Some((device, interface));
        Ok(())
    }

    fn interface(&self) -> CoreResult<&Interface> {
        match &self.device {
            Some((_, interface)) => Ok(interface),
            None => {
                log::error!("transport used before open");
                Err(CoreError::Io)
            }
        }
    }
}

#[maybe_async]
impl Transport for HidFeatureTransport {
    async fn open(&mut self) -> CoreResult<()> {
        if self.device.is_some() {
            return Ok(());
        }
        self.open_device().map_err(|e| {
            log::error!("{}", e);
            CoreError::Io
        })
    }

    fn is_open(&self) -> bool {
        self.device.is_some()
    }

    async fn send_feature_report(&mut self, report_id: u8, data: &[u8]) -> CoreResult<()> {
        let mut report = Vec::with_capacity(data.len() + 1);
        report.push(report_id);
        report.extend_from_slice(data);

        let interface = self.interface()?;
        let completion = futures_lite::future::block_on(interface.control_out(ControlOut {
            control_type: ControlType::Class,
            recipient: Recipient::Interface,
            request: SET_REPORT,
            value: REPORT_TYPE_FEATURE | report_id as u16,
            index: HID_INTERFACE as u16,
            data: &report,
        }));

        completion.status.map_err(|e| {
            log::debug!("SET_REPORT failed: {}", e);
            CoreError::Io
        })?;

        log::trace!("sent {} byte feature report", report.len());
        Ok(())
    }

    async fn receive_feature_report(&mut self, report_id: u8, buf: &mut [u8]) -> CoreResult<usize> {
        let interface = self.interface()?;
        let completion = futures_lite::future::block_on(interface.control_in(ControlIn {
            control_type: ControlType::Class,
            recipient: Recipient::Interface,
            request: GET_REPORT,
            value: REPORT_TYPE_FEATURE | report_id as u16,
            index: HID_INTERFACE as u16,
            length: buf.len() as u16,
        }));

        completion.status.map_err(|e| {
            log::debug!("GET_REPORT failed: {}", e);
            CoreError::Io
        })?;

        let data = completion.data;
        let n = data.len().min(buf.len());
        buf[..n].copy_from_slice(&data[..n]);
        log::trace!("received {} byte feature report", n);
        Ok(n)
    }

    async fn delay_ms(&mut self, ms: u32) {
        if ms > 0 {
            std::thread::sleep(Duration::from_millis(ms as u64));
        }
    }
}

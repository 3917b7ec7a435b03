use crate::device::{DeviceConfig, TransferType};
use crate::error::LacError;
use crate::packet::Direction;
use crate::transport::Transport;
use bytes::Bytes;
use nusb::transfer::{Buffer, Bulk, BulkOrInterrupt, Completion, EndpointDirection, In, Interrupt, Out};
use nusb::{Endpoint, Interface, MaybeFuture};
use std::time::Duration;
use tracing::{debug, info, warn};

// How long to wait for a cancelled transfer to be handed back
const CANCEL_DRAIN_TIMEOUT: Duration = Duration::from_millis(100);

enum Endpoints {
    Interrupt {
        out: Endpoint<Interrupt, Out>,
        input: Endpoint<Interrupt, In>,
    },
    Bulk {
        out: Endpoint<Bulk, Out>,
        input: Endpoint<Bulk, In>,
    },
}

/// The LAC board's claimed interface and its OUT/IN endpoint pair.
pub struct UsbTransport {
    _interface: Interface,
    endpoints: Endpoints,
}

impl UsbTransport {
    /// Finds the first board matching the configured IDs and claims its interface.
    pub fn open(config: &DeviceConfig) -> Result<Self, LacError> {
        info!(
            "Searching for LAC board {:04x}:{:04x}...",
            config.vendor_id, config.product_id
        );
        let device_info = nusb::list_devices()
            .wait()?
            .find(|d| d.vendor_id() == config.vendor_id && d.product_id() == config.product_id)
            .ok_or(LacError::DeviceNotFound {
                vendor_id: config.vendor_id,
                product_id: config.product_id,
            })?;

        info!("Found device at address {}", device_info.device_address());
        debug!(?device_info, "Device details");

        let device = device_info.open().wait()?;
        if device.active_configuration().is_err() {
            info!("Device unconfigured, selecting configuration 1");
            device.set_configuration(1).wait()?;
        }

        let interface = if config.detach_kernel_driver {
            device.detach_and_claim_interface(config.interface).wait()?
        } else {
            device.claim_interface(config.interface).wait()?
        };
        info!("Interface {} claimed successfully.", config.interface);

        let endpoints = match config.transfer_type {
            TransferType::Interrupt => Endpoints::Interrupt {
                out: interface.endpoint::<Interrupt, Out>(config.endpoint_out)?,
                input: interface.endpoint::<Interrupt, In>(config.endpoint_in)?,
            },
            TransferType::Bulk => Endpoints::Bulk {
                out: interface.endpoint::<Bulk, Out>(config.endpoint_out)?,
                input: interface.endpoint::<Bulk, In>(config.endpoint_in)?,
            },
        };

        Ok(Self {
            _interface: interface,
            endpoints,
        })
    }
}

impl Transport for UsbTransport {
    fn write(&mut self, data: &[u8], timeout: Duration) -> Result<usize, LacError> {
        match &mut self.endpoints {
            Endpoints::Interrupt { out, .. } => write_endpoint(out, data, timeout),
            Endpoints::Bulk { out, .. } => write_endpoint(out, data, timeout),
        }
    }

    fn read(&mut self, len: usize, timeout: Duration) -> Result<Bytes, LacError> {
        match &mut self.endpoints {
            Endpoints::Interrupt { input, .. } => read_endpoint(input, len, timeout),
            Endpoints::Bulk { input, .. } => read_endpoint(input, len, timeout),
        }
    }
}

fn write_endpoint<E: BulkOrInterrupt>(
    endpoint: &mut Endpoint<E, Out>,
    data: &[u8],
    timeout: Duration,
) -> Result<usize, LacError> {
    endpoint.submit(Buffer::from(data.to_vec()));
    let completion = wait_or_cancel(endpoint, timeout, Direction::HostToDevice)?;
    completion.status?;
    Ok(completion.actual_len)
}

fn read_endpoint<E: BulkOrInterrupt>(
    endpoint: &mut Endpoint<E, In>,
    len: usize,
    timeout: Duration,
) -> Result<Bytes, LacError> {
    // IN requests are sized in whole packets
    let request_len = len.max(endpoint.max_packet_size());
    let buffer = endpoint.allocate(request_len);
    endpoint.submit(buffer);
    let completion = wait_or_cancel(endpoint, timeout, Direction::DeviceToHost)?;
    completion.status?;
    Ok(Bytes::copy_from_slice(&completion.buffer[..]))
}

/// The part of an endpoint's transfer queue the timeout path needs.
trait TransferQueue {
    type Completion;

    fn next_complete(&mut self, timeout: Duration) -> Option<Self::Completion>;
    fn cancel(&mut self);
    fn in_flight(&self) -> usize;
    fn succeeded(completion: &Self::Completion) -> bool;
}

impl<E: BulkOrInterrupt, D: EndpointDirection> TransferQueue for Endpoint<E, D> {
    type Completion = Completion;

    fn next_complete(&mut self, timeout: Duration) -> Option<Completion> {
        self.wait_next_complete(timeout)
    }

    fn cancel(&mut self) {
        self.cancel_all();
    }

    fn in_flight(&self) -> usize {
        self.pending()
    }

    fn succeeded(completion: &Completion) -> bool {
        completion.status.is_ok()
    }
}

/// Waits for the pending transfer. On timeout the transfer is cancelled and
/// its completion drained so it cannot surface in the next exchange.
///
/// A transfer that completed successfully while being cancelled is returned
/// as a success: a write that reached the board must be followed by its read.
fn wait_or_cancel<Q: TransferQueue>(
    queue: &mut Q,
    timeout: Duration,
    direction: Direction,
) -> Result<Q::Completion, LacError> {
    if let Some(completion) = queue.next_complete(timeout) {
        return Ok(completion);
    }

    queue.cancel();
    while queue.in_flight() > 0 {
        match queue.next_complete(CANCEL_DRAIN_TIMEOUT) {
            Some(completion) if Q::succeeded(&completion) => {
                debug!(%direction, "Transfer completed while being cancelled");
                return Ok(completion);
            }
            Some(_) => {}
            None => {
                warn!(%direction, "Cancelled transfer was not returned in time");
                break;
            }
        }
    }
    Err(LacError::Timeout { direction })
}

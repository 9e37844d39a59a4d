//! Inquiry scan session.
//!
//! A [`ScanSession`] drives one classic Bluetooth inquiry at a time. The radio
//! driver feeds it discovery events from its own context; the application
//! starts and stops scans from another. Each device is recorded once per scan
//! (first sighting wins), and observers are told about devices and about scan
//! completion through [`Callback`]s.
//!
//! ```text
//!   Idle ──start──▶ Discovering ──stop / discovery stopped──▶ Stopping ──▶ Idle
//! ```
//!
//! `stop()` signals completion locally without waiting for the radio to
//! confirm the inquiry was cancelled. Results that straggle in afterwards are
//! dropped because the session is no longer discovering.
//!
//! The session is shared by reference between the radio context and the
//! application, so firmware typically keeps it in a `static` (e.g. via
//! `static_cell::StaticCell`).

use alloc::collections::BTreeSet;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::fmt;
use core::pin::pin;
use core::sync::atomic::{AtomicU32, Ordering};
use core::time::Duration;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::signal::Signal;

use crate::address::DeviceAddress;
use crate::device::{DeviceSnapshot, DiscoveryProperty};
use crate::eir::EIR_PARSE_BOUND;

/// Inquiry length unit defined by the baseband (1.28 s).
const INQUIRY_UNIT_MS: u128 = 1280;

/// Longest inquiry the baseband accepts, in inquiry units (61.44 s).
pub const MAX_INQUIRY_LENGTH: u8 = 0x30;

static NEXT_SESSION_ID: AtomicU32 = AtomicU32::new(1);

/// Identifies the session a [`DeviceSnapshot`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(u32);

impl SessionId {
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u32 {
        self.0
    }

    fn next() -> Self {
        Self(NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Scan session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    Discovering,
    Stopping,
}

impl ScanState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanState::Idle => "idle",
            ScanState::Discovering => "discovering",
            ScanState::Stopping => "stopping",
        }
    }
}

/// Discovery state reported by the radio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryState {
    Started,
    Stopped,
}

/// An event delivered by the radio driver.
#[derive(Debug, Clone, Copy)]
pub enum DiscoveryEvent<'a> {
    /// One inquiry result.
    Result {
        address: DeviceAddress,
        properties: &'a [DiscoveryProperty<'a>],
    },
    /// Discovery started or stopped.
    StateChanged(DiscoveryState),
}

/// Radio control used by a [`ScanSession`].
///
/// Implementations wrap the controller's inquiry commands. Both calls only
/// issue the request; results and state changes arrive later as
/// [`DiscoveryEvent`]s.
pub trait DiscoveryRadio {
    type Error: fmt::Debug;

    /// Start a general inquiry lasting roughly `duration`.
    fn start_discovery(&self, duration: Duration) -> Result<(), Self::Error>;

    /// Cancel the running inquiry.
    fn cancel_discovery(&self) -> Result<(), Self::Error>;
}

impl<T: DiscoveryRadio + ?Sized> DiscoveryRadio for &T {
    type Error = T::Error;

    fn start_discovery(&self, duration: Duration) -> Result<(), Self::Error> {
        (**self).start_discovery(duration)
    }

    fn cancel_discovery(&self) -> Result<(), Self::Error> {
        (**self).cancel_discovery()
    }
}

/// Convert a scan duration into baseband inquiry units, rounded up and
/// clamped to `1..=MAX_INQUIRY_LENGTH`.
pub fn inquiry_length(duration: Duration) -> u8 {
    let units = duration.as_millis().div_ceil(INQUIRY_UNIT_MS);
    units.clamp(1, MAX_INQUIRY_LENGTH as u128) as u8
}

/// A notification handler, invoked synchronously from the radio context.
///
/// Used both for per-device notifications (`Callback<DeviceSnapshot>`) and
/// for scan completion (`Callback<ScanResultSet>`).
pub struct Callback<'a, T: ?Sized>(Arc<dyn Fn(&T) + Send + Sync + 'a>);

impl<'a, T: ?Sized> Callback<'a, T> {
    pub fn new(f: impl Fn(&T) + Send + Sync + 'a) -> Self {
        Self(Arc::new(f))
    }

    pub fn call(&self, value: &T) {
        (self.0)(value)
    }
}

impl<T: ?Sized> Clone for Callback<'_, T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T: ?Sized> fmt::Debug for Callback<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Callback(..)")
    }
}

/// Runtime scan configuration.
#[derive(Debug, Clone, Copy)]
pub struct ScanConfig {
    /// Invoke the device callback on every sighting, not only the first.
    /// The result set holds one entry per device either way.
    pub report_duplicates: bool,
    /// Number of EIR bytes decoded per inquiry result.
    pub eir_bound: usize,
}

impl ScanConfig {
    pub const fn new() -> Self {
        Self {
            report_duplicates: false,
            eir_bound: EIR_PARSE_BOUND,
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Devices found by a scan, in order of first sighting.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanResultSet {
    devices: Vec<DeviceSnapshot>,
}

impl ScanResultSet {
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Device at `index` (`0..len()`).
    pub fn get(&self, index: usize) -> Option<&DeviceSnapshot> {
        self.devices.get(index)
    }

    pub fn iter(&self) -> core::slice::Iter<'_, DeviceSnapshot> {
        self.devices.iter()
    }

    pub fn as_slice(&self) -> &[DeviceSnapshot] {
        &self.devices
    }

    /// Log every device's summary.
    pub fn dump(&self) {
        log::debug!("Scan results ({} devices):", self.devices.len());
        for device in &self.devices {
            log::debug!("- {}", device);
        }
    }
}

impl<'r> IntoIterator for &'r ScanResultSet {
    type Item = &'r DeviceSnapshot;
    type IntoIter = core::slice::Iter<'r, DeviceSnapshot>;

    fn into_iter(self) -> Self::IntoIter {
        self.devices.iter()
    }
}

struct Inner<'a> {
    state: ScanState,
    seen: BTreeSet<DeviceAddress>,
    results: Vec<DeviceSnapshot>,
    report_duplicates: bool,
    on_device: Option<Callback<'a, DeviceSnapshot>>,
    on_complete: Option<Callback<'a, ScanResultSet>>,
}

/// Outcome of checking a sighting against the session state.
enum Sighting {
    NotDiscovering,
    Duplicate,
    Report { first: bool },
}

/// An inquiry scan session. See the module docs.
pub struct ScanSession<'a, R> {
    id: SessionId,
    radio: R,
    eir_bound: usize,
    inner: Mutex<CriticalSectionRawMutex, RefCell<Inner<'a>>>,
    /// Reset before each inquiry request, signalled once when it ends.
    scan_end: Signal<CriticalSectionRawMutex, ()>,
}

impl<'a, R: DiscoveryRadio> ScanSession<'a, R> {
    pub fn new(radio: R, config: ScanConfig) -> Self {
        let id = SessionId::next();
        log::debug!("Scan session {} created", id);
        Self {
            id,
            radio,
            eir_bound: config.eir_bound,
            inner: Mutex::new(RefCell::new(Inner {
                state: ScanState::Idle,
                seen: BTreeSet::new(),
                results: Vec::new(),
                report_duplicates: config.report_duplicates,
                on_device: None,
                on_complete: None,
            })),
            scan_end: Signal::new(),
        }
    }

    fn with_inner<T>(&self, f: impl FnOnce(&mut Inner<'a>) -> T) -> T {
        self.inner.lock(|cell| f(&mut cell.borrow_mut()))
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn state(&self) -> ScanState {
        self.with_inner(|inner| inner.state)
    }

    pub fn radio(&self) -> &R {
        &self.radio
    }

    /// Register the per-device callback. With `report_duplicates` the
    /// callback fires on every sighting of a device instead of only the first.
    pub fn set_device_callback(
        &self,
        on_device: Option<Callback<'a, DeviceSnapshot>>,
        report_duplicates: bool,
    ) {
        self.with_inner(|inner| {
            inner.on_device = on_device;
            inner.report_duplicates = report_duplicates;
        });
    }

    /// Start a scan and return immediately. `on_complete` fires once when the
    /// scan ends.
    ///
    /// Returns `false` without doing anything if a scan is already running,
    /// or if the radio rejected the request.
    pub fn start(&self, duration: Duration, on_complete: Callback<'a, ScanResultSet>) -> bool {
        self.begin(duration, Some(on_complete))
    }

    /// Start a scan and wait until it ends through [`stop`](Self::stop) or
    /// the radio reporting that discovery stopped.
    ///
    /// `wait` runs between checks of the completion signal and must suspend
    /// the caller (task delay, `wfi`, thread sleep) so the radio context can
    /// deliver its events. If the scan cannot start, the current results are
    /// returned at once.
    pub fn start_blocking_with(&self, duration: Duration, mut wait: impl FnMut()) -> ScanResultSet {
        if self.begin(duration, None) {
            let mut done = pin!(self.scan_end.wait());
            while embassy_futures::poll_once(done.as_mut()).is_pending() {
                wait();
            }
        }
        self.results()
    }

    /// Start a scan and park the calling thread until it ends.
    ///
    /// If the scan cannot start, the current results are returned at once.
    #[cfg(any(test, feature = "std"))]
    pub fn start_blocking(&self, duration: Duration) -> ScanResultSet {
        park::block_on(self.scan(duration))
    }

    /// Async form of [`start_blocking_with`](Self::start_blocking_with).
    pub async fn scan(&self, duration: Duration) -> ScanResultSet {
        if self.begin(duration, None) {
            self.scan_end.wait().await;
        }
        self.results()
    }

    fn begin(&self, duration: Duration, on_complete: Option<Callback<'a, ScanResultSet>>) -> bool {
        let previous = self.with_inner(|inner| {
            if inner.state != ScanState::Idle {
                return Some(inner.state);
            }
            self.scan_end.reset();
            inner.seen.clear();
            inner.results.clear();
            inner.on_complete = on_complete;
            inner.state = ScanState::Discovering;
            None
        });
        if let Some(state) = previous {
            log::warn!("Session {}: start ignored while {}", self.id, state.as_str());
            return false;
        }

        log::info!("Session {}: discovering nearby devices for {:?}", self.id, duration);
        if let Err(e) = self.radio.start_discovery(duration) {
            log::error!("Session {}: start discovery failed: {:?}", self.id, e);
            self.with_inner(|inner| {
                if inner.state == ScanState::Discovering {
                    inner.state = ScanState::Idle;
                    inner.on_complete = None;
                }
            });
            return false;
        }
        true
    }

    /// Stop the running scan. Completion is signalled immediately, without
    /// waiting for the radio to confirm. No-op unless discovering.
    pub fn stop(&self) {
        let state = self.state();
        if state != ScanState::Discovering {
            log::debug!("Session {}: stop ignored while {}", self.id, state.as_str());
            return;
        }
        if let Err(e) = self.radio.cancel_discovery() {
            log::error!("Session {}: cancel discovery failed: {:?}", self.id, e);
        }
        self.finish();
    }

    /// Dispatch a radio event.
    pub fn handle_event(&self, event: &DiscoveryEvent<'_>) {
        match *event {
            DiscoveryEvent::Result {
                address,
                properties,
            } => self.on_discovery_result(address, properties),
            DiscoveryEvent::StateChanged(state) => self.on_discovery_state_changed(state),
        }
    }

    /// Handle one inquiry result.
    ///
    /// A first sighting is recorded before the device callback runs, so a
    /// callback that stops the scan still finds its device in the results.
    pub fn on_discovery_result(&self, address: DeviceAddress, properties: &[DiscoveryProperty<'_>]) {
        let sighting = self.with_inner(|inner| {
            if inner.state != ScanState::Discovering {
                return Sighting::NotDiscovering;
            }
            let first = !inner.seen.contains(&address);
            if !first && !inner.report_duplicates {
                return Sighting::Duplicate;
            }
            Sighting::Report { first }
        });

        let first = match sighting {
            Sighting::NotDiscovering => {
                log::trace!("Session {}: result for {} while not discovering", self.id, address);
                return;
            }
            Sighting::Duplicate => {
                log::debug!("Session {}: ignoring {}, already seen it", self.id, address);
                return;
            }
            Sighting::Report { first } => first,
        };

        log::debug!("Session {}: device found {}", self.id, address);
        let device = DeviceSnapshot::from_discovery(address, properties, self.id, self.eir_bound);

        let accepted = self.with_inner(|inner| {
            if inner.state != ScanState::Discovering {
                return None;
            }
            if first && inner.seen.insert(address) {
                inner.results.push(device.clone());
            } else if !inner.report_duplicates {
                return None;
            }
            Some(inner.on_device.clone())
        });

        match accepted {
            Some(Some(callback)) => callback.call(&device),
            Some(None) => {}
            None => log::debug!("Session {}: {} dropped, scan state changed", self.id, address),
        }
    }

    /// Handle a discovery state change from the radio.
    pub fn on_discovery_state_changed(&self, state: DiscoveryState) {
        match state {
            DiscoveryState::Started => log::info!("Session {}: discovery started", self.id),
            DiscoveryState::Stopped => {
                log::info!("Session {}: discovery stopped", self.id);
                self.finish();
            }
        }
    }

    /// Discovering → Stopping → Idle, then notify. Runs at most once per scan.
    fn finish(&self) {
        let finished = self.with_inner(|inner| {
            if inner.state != ScanState::Discovering {
                return None;
            }
            inner.state = ScanState::Stopping;
            let count = inner.results.len();
            let completion = inner.on_complete.take().map(|callback| {
                let results = ScanResultSet {
                    devices: inner.results.clone(),
                };
                (callback, results)
            });
            inner.state = ScanState::Idle;
            Some((count, completion))
        });

        let Some((count, completion)) = finished else {
            return;
        };
        log::info!("Session {}: scan complete, {} devices", self.id, count);

        if let Some((callback, results)) = completion {
            callback.call(&results);
        }
        self.scan_end.signal(());
    }

    /// Results of the current or most recent scan.
    pub fn results(&self) -> ScanResultSet {
        self.with_inner(|inner| ScanResultSet {
            devices: inner.results.clone(),
        })
    }

    /// Forget the recorded devices. A running scan will report them again.
    pub fn clear_results(&self) {
        self.with_inner(|inner| {
            inner.results.clear();
            inner.seen.clear();
        });
    }
}

/// Thread-parking executor for the synchronous start on hosted targets.
#[cfg(any(test, feature = "std"))]
mod park {
    use core::future::Future;
    use core::pin::pin;
    use core::task::{Context, Poll};
    use std::sync::Arc;
    use std::task::{Wake, Waker};
    use std::thread::{self, Thread};

    struct ThreadWaker(Thread);

    impl Wake for ThreadWaker {
        fn wake(self: Arc<Self>) {
            self.0.unpark();
        }

        fn wake_by_ref(self: &Arc<Self>) {
            self.0.unpark();
        }
    }

    /// Poll `fut` to completion, parking between wakeups.
    pub(super) fn block_on<F: Future>(fut: F) -> F::Output {
        let mut fut = pin!(fut);
        let waker = Waker::from(Arc::new(ThreadWaker(thread::current())));
        let mut cx = Context::from_waker(&waker);
        loop {
            match fut.as_mut().poll(&mut cx) {
                Poll::Ready(output) => return output,
                Poll::Pending => thread::park(),
            }
        }
    }
}

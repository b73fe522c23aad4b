
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    DeviceNotReady,
    DescriptorUnreadable,
    UnknownCsdVersion,
    MalformedCsd,
    CapacityOverflow,
    SectorReadFailed,
    TransportWrite,
    TransportClosed,
    ListenFailed,
    AcceptFailed,
    OutOfBounds,
}

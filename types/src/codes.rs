use strum::{Display, FromRepr};

// PTP and MTP operation codes, as listed in the DeviceInfo dataset.
#[repr(u16)]
#[derive(Copy, Clone, Debug, Display, FromRepr, PartialEq, Eq)]
pub enum OperationCode {
    GetDeviceInfo = 0x1001,
    OpenSession = 0x1002,
    CloseSession = 0x1003,
    GetStorageIDs = 0x1004,
    GetStorageInfo = 0x1005,
    GetNumObjects = 0x1006,
    GetObjectHandles = 0x1007,
    GetObjectInfo = 0x1008,
    GetObject = 0x1009,
    GetThumb = 0x100a,
    DeleteObject = 0x100b,
    SendObjectInfo = 0x100c,
    SendObject = 0x100d,
    InitiateCapture = 0x100e,
    FormatStore = 0x100f,
    ResetDevice = 0x1010,
    SelfTest = 0x1011,
    SetObjectProtection = 0x1012,
    PowerDown = 0x1013,
    GetDevicePropDesc = 0x1014,
    GetDevicePropValue = 0x1015,
    SetDevicePropValue = 0x1016,
    ResetDevicePropValue = 0x1017,
    TerminateOpenCapture = 0x1018,
    MoveObject = 0x1019,
    CopyObject = 0x101a,
    GetPartialObject = 0x101b,
    InitiateOpenCapture = 0x101c,
    GetSecureTimeChallenge = 0x9101,
    GetSecureTimeResponse = 0x9102,
    SetLicenseResponse = 0x9103,
    GetSyncList = 0x9104,
    SendMeterChallengeQuery = 0x9105,
    GetMeterChallenge = 0x9106,
    SetMeterResponse = 0x9107,
    CleanDataStore = 0x9108,
    GetLicenseState = 0x9109,
    SendWMDRMPDCommand = 0x910a,
    SendWMDRMPDRequest = 0x910b,
    GetObjectPropsSupported = 0x9801,
    GetObjectPropDesc = 0x9802,
    GetObjectPropValue = 0x9803,
    SetObjectPropValue = 0x9804,
    GetObjectPropList = 0x9805,
    SetObjectPropList = 0x9806,
    GetInterdependentPropDesc = 0x9807,
    SendObjectPropList = 0x9808,
    GetObjectReferences = 0x9810,
    SetObjectReferences = 0x9811,
    Skip = 0x9820,
}

#[repr(u16)]
#[derive(Copy, Clone, Debug, Display, FromRepr, PartialEq, Eq)]
pub enum ResponseCode {
    Undefined = 0x2000,
    Ok = 0x2001,
    GeneralError = 0x2002,
    SessionNotOpen = 0x2003,
    InvalidTransactionID = 0x2004,
    OperationNotSupported = 0x2005,
    ParameterNotSupported = 0x2006,
    IncompleteTransfer = 0x2007,
    InvalidStorageId = 0x2008,
    InvalidObjectHandle = 0x2009,
    DevicePropNotSupported = 0x200a,
    InvalidObjectFormatCode = 0x200b,
    StoreFull = 0x200c,
    ObjectWriteProtected = 0x200d,
    StoreReadOnly = 0x200e,
    AccessDenied = 0x200f,
    NoThumbnailPresent = 0x2010,
    SelfTestFailed = 0x2011,
    PartialDeletion = 0x2012,
    StoreNotAvailable = 0x2013,
    SpecificationByFormatUnsupported = 0x2014,
    NoValidObjectInfo = 0x2015,
    InvalidCodeFormat = 0x2016,
    UnknownVendorCode = 0x2017,
    CaptureAlreadyTerminated = 0x2018,
    DeviceBusy = 0x2019,
    InvalidParentObject = 0x201a,
    InvalidDevicePropFormat = 0x201b,
    InvalidDevicePropValue = 0x201c,
    InvalidParameter = 0x201d,
    SessionAlreadyOpen = 0x201e,
    TransactionCancelled = 0x201f,
    SpecificationOfDestinationUnsupported = 0x2020,
}

#[repr(u16)]
#[derive(Copy, Clone, Debug, Display, FromRepr, PartialEq, Eq)]
pub enum PropertyCode {
    BatteryLevel = 0x5001,
    FunctionalMode = 0x5002,
    ImageSize = 0x5003,
    DateTime = 0x5011,
    SecureTime = 0xd101,
    DeviceCertificate = 0xd102,
    RevocationInfo = 0xd103,
    SynchronizationPartner = 0xd401,
    DeviceFriendlyName = 0xd402,
    VolumeLevel = 0xd403,
    DeviceIcon = 0xd405,
    SessionInitiatorInfo = 0xd406,
    PerceivedDeviceType = 0xd407,
    PlaybackRate = 0xd410,
    PlaybackObject = 0xd411,
    PlaybackContainerIndex = 0xd412,
    PlaybackPosition = 0xd413,
}

impl OperationCode {
    pub fn id(&self) -> u16 {
        *self as u16
    }
}

impl PropertyCode {
    pub fn id(&self) -> u16 {
        *self as u16
    }
}

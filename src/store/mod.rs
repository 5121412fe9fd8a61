//! 인메모리 저장소 (방 / 슬롯 / 스터디 세트)

pub mod rooms;
pub mod slots;
pub mod study_sets;

pub use rooms::RoomStore;
pub use slots::SlotStore;
pub use study_sets::StudySetStore;

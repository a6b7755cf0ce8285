//! Status helper enums mapping to SMALLSERIAL lookup tables.
//!
//! Each enum variant's discriminant matches the seed data order (1-based)
//! in the corresponding `*_statuses` database table.

/// Status ID type matching SMALLINT/SMALLSERIAL in the database.
pub type StatusId = i16;

macro_rules! define_status_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $val:expr ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[repr(i16)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $val ),+
        }

        impl $name {
            /// Return the database status ID.
            pub fn id(self) -> StatusId {
                self as StatusId
            }

            /// Map a database status ID back to the enum.
            pub fn from_id(id: StatusId) -> Option<Self> {
                match id {
                    $( x if x == $val => Some(Self::$variant), )+
                    _ => None,
                }
            }
        }

        impl From<$name> for StatusId {
            fn from(value: $name) -> Self {
                value as StatusId
            }
        }
    };
}

define_status_enum! {
    /// Generation task lifecycle. `Success` and `Failed` are absorbing.
    GenerationStatus {
        Generating = 1,
        Success = 2,
        Failed = 3,
    }
}

impl GenerationStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Generating)
    }
}

define_status_enum! {
    /// Asset archive outbox job status.
    ArchiveJobStatus {
        Pending = 1,
        Done = 2,
        Failed = 3,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_status_ids_match_seed_order() {
        assert_eq!(GenerationStatus::Generating.id(), 1);
        assert_eq!(GenerationStatus::Success.id(), 2);
        assert_eq!(GenerationStatus::Failed.id(), 3);
    }

    #[test]
    fn from_id_round_trips() {
        for status in [
            GenerationStatus::Generating,
            GenerationStatus::Success,
            GenerationStatus::Failed,
        ] {
            assert_eq!(GenerationStatus::from_id(status.id()), Some(status));
        }
        assert_eq!(ArchiveJobStatus::from_id(9), None);
    }

    #[test]
    fn only_generating_is_open() {
        assert!(!GenerationStatus::Generating.is_terminal());
        assert!(GenerationStatus::Success.is_terminal());
        assert!(GenerationStatus::Failed.is_terminal());
    }
}

// ABOUTME: Re-exports generated protobuf types for every atomix primitive service.
// ABOUTME: Single source of truth for message shapes and gRPC method paths.

#![allow(clippy::derive_partial_eq_without_eq)]

/// Generated protobuf types, nested to mirror the proto package names.
pub mod atomix {
    pub mod primitive {
        pub mod v1 {
            tonic::include_proto!("atomix.primitive.v1");
        }
        pub mod counter {
            pub mod v1 {
                tonic::include_proto!("atomix.primitive.counter.v1");
            }
        }
        pub mod election {
            pub mod v1 {
                tonic::include_proto!("atomix.primitive.election.v1");
            }
        }
        pub mod indexedmap {
            pub mod v1 {
                tonic::include_proto!("atomix.primitive.indexedmap.v1");
            }
        }
        pub mod list {
            pub mod v1 {
                tonic::include_proto!("atomix.primitive.list.v1");
            }
        }
        pub mod lock {
            pub mod v1 {
                tonic::include_proto!("atomix.primitive.lock.v1");
            }
        }
        pub mod map {
            pub mod v1 {
                tonic::include_proto!("atomix.primitive.map.v1");
            }
        }
        pub mod set {
            pub mod v1 {
                tonic::include_proto!("atomix.primitive.set.v1");
            }
        }
        pub mod value {
            pub mod v1 {
                tonic::include_proto!("atomix.primitive.value.v1");
            }
        }
    }
}

macro_rules! primitive_package {
    ($module:ident, $package:literal) => {
        pub mod $module {
            pub use crate::atomix::primitive::$module::v1::*;
            include!(concat!(env!("OUT_DIR"), "/", $package, ".paths.rs"));
        }
    };
}

primitive_package!(counter, "atomix.primitive.counter.v1");
primitive_package!(election, "atomix.primitive.election.v1");
primitive_package!(list, "atomix.primitive.list.v1");
primitive_package!(lock, "atomix.primitive.lock.v1");
primitive_package!(map, "atomix.primitive.map.v1");
primitive_package!(set, "atomix.primitive.set.v1");
primitive_package!(value, "atomix.primitive.value.v1");

/// Messages and method paths for the IndexedMap primitive.
pub mod indexed_map {
    pub use crate::atomix::primitive::indexedmap::v1::*;
    include!(concat!(
        env!("OUT_DIR"),
        "/atomix.primitive.indexedmap.v1.paths.rs"
    ));
}

pub use atomix::primitive::v1::{
    CloseSessionRequest, CloseSessionResponse, ObjectMeta, OpenSessionRequest,
    OpenSessionResponse, Precondition, PrimitiveId, SessionOptions,
};

/// Method paths of a primitive's session manager service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionPaths {
    pub open_session: &'static str,
    pub close_session: &'static str,
}

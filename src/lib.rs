// Crate entry point. Re-export modules so tests and binaries can import them easily.
//
// Responsibilities
// - Only declare and expose modules. No business logic here.

pub mod shared {
    pub mod infrastructure {
        pub mod key_value_store;
        pub mod sandbox;
    }
}

pub mod modules {
    pub mod ephemeral_store {
        pub mod core {
            pub mod image_spec;
        }
        pub mod fixture {
            pub mod handle;
            pub mod orchestrator;
            pub mod scope;
        }
        pub mod readiness {
            pub mod gate;
            pub mod policy;
        }
    }
    pub mod conditional_writes {
        pub mod core {
            pub mod condition;
            pub mod outcome;
            pub mod record;
            pub mod table_definition;
        }
        pub mod use_cases {
            pub mod load_schema {
                pub mod handler;
            }
            pub mod provision_table {
                pub mod handler;
            }
            pub mod put_if_absent {
                pub mod handler;
            }
            pub mod verify_contract {
                pub mod handler;
            }
        }
    }
}

pub mod shell;

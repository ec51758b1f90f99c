/*
 * Copyright (c) 2024. Govcraft
 *
 * Licensed under either of
 *   * Apache License, Version 2.0 (the "License");
 *     you may not use this file except in compliance with the License.
 *     You may obtain a copy of the License at http://www.apache.org/licenses/LICENSE-2.0
 *   * MIT license: http://opensource.org/licenses/MIT
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the applicable License for the specific language governing permissions and
 * limitations under that License.
 */
#![forbid(unsafe_code)]

//! Acton Macro Library
//!
//! Procedural macros for the Acton dispatch runtime.
//!
//! # Message Macro
//!
//! [`acton_message`] turns a plain struct or enum into a message that can be
//! sent through any mailbox:
//!
//! ```ignore
//! #[acton_message]
//! pub struct Ping;
//!
//! #[acton_message]
//! pub struct Deposit {
//!     pub amount: u64,
//! }
//! ```
//!
//! # Agent Macro
//!
//! [`acton_agent`] prepares the model type an agent's handlers operate on:
//!
//! ```ignore
//! #[acton_agent]
//! pub struct Account {
//!     balance: u64,
//! }
//! ```

use proc_macro::TokenStream;

use quote::quote;
use syn::{parse_macro_input, DeriveInput};

fn has_derive(input: &DeriveInput, trait_name: &str) -> bool {
    input.attrs.iter().any(|attr| {
        if attr.path().is_ident("derive") {
            let mut found = false;
            let _ = attr.parse_nested_meta(|meta| {
                if meta.path.is_ident(trait_name) {
                    found = true;
                }
                Ok(())
            });
            found
        } else {
            false
        }
    })
}

/// Configuration options parsed from `#[acton_agent(...)]` attributes.
#[derive(Default)]
struct AgentConfig {
    /// Skip deriving Default (user will implement it manually).
    no_default: bool,
}

impl AgentConfig {
    /// Parse configuration from attribute tokens.
    fn parse(attr: &TokenStream) -> Self {
        let mut config = Self::default();

        let attr_string = attr.to_string();
        for part in attr_string.split(',') {
            if part.trim() == "no_default" {
                config.no_default = true;
            }
        }

        config
    }
}

/// Derives the traits required for a type to travel through Acton mailboxes.
///
/// This expands to:
/// - `#[derive(Clone, Debug)]` (only the traits not already present)
/// - A compile-time assertion that the type is `Send + Sync + 'static`
///
/// Messages are shared between every demand a broadcast produces, so they
/// must be `Sync` as well as `Send`.
///
/// ```ignore
/// use acton_macro::acton_message;
///
/// #[acton_message]
/// pub struct Increment {
///     pub amount: u32,
/// }
/// ```
#[proc_macro_attribute]
pub fn acton_message(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as DeriveInput);

    let name = &input.ident;
    let generics = &input.generics;
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    let need_clone = !has_derive(&input, "Clone");
    let need_debug = !has_derive(&input, "Debug");

    let derives = {
        let mut traits = Vec::new();
        if need_clone {
            traits.push(quote!(Clone));
        }
        if need_debug {
            traits.push(quote!(Debug));
        }
        if traits.is_empty() {
            quote!()
        } else {
            quote!(#[derive(#(#traits),*)])
        }
    };

    let assert_ident = quote::format_ident!("_AssertActonMessage_{}", name);

    let expanded = quote! {
        #derives
        #input

        #[doc(hidden)]
        #[allow(dead_code, non_camel_case_types, non_snake_case, clippy::needless_lifetimes)]
        const _: () = {
            fn #assert_ident #impl_generics () #where_clause {
                fn assert_bounds<T: Send + Sync + 'static>() {}
                assert_bounds::<#name #ty_generics>();
            }
        };
    };

    TokenStream::from(expanded)
}

/// Derives the boilerplate for an agent model type.
///
/// The model is the state an agent's handlers mutate. It lives behind the
/// agent's execution slot and is only ever touched by the worker thread
/// currently running one of that agent's handlers, so it needs `Send` but
/// not `Sync`.
///
/// This expands to:
/// - `#[derive(Default, Debug)]` (only the traits not already present)
/// - A compile-time assertion that the type is `Send + 'static`
///
/// # Options
///
/// `no_default` skips deriving `Default` for models that provide their own:
///
/// ```ignore
/// #[acton_agent(no_default)]
/// struct Throttle {
///     window: std::time::Duration,
/// }
///
/// impl Default for Throttle {
///     fn default() -> Self {
///         Self { window: std::time::Duration::from_millis(250) }
///     }
/// }
/// ```
#[proc_macro_attribute]
pub fn acton_agent(attr: TokenStream, item: TokenStream) -> TokenStream {
    let config = AgentConfig::parse(&attr);

    let input = parse_macro_input!(item as DeriveInput);

    let name = &input.ident;
    let generics = &input.generics;
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    let need_default = !config.no_default && !has_derive(&input, "Default");
    let need_debug = !has_derive(&input, "Debug");

    let derives = {
        let mut traits = Vec::new();
        if need_default {
            traits.push(quote!(Default));
        }
        if need_debug {
            traits.push(quote!(Debug));
        }
        if traits.is_empty() {
            quote!()
        } else {
            quote!(#[derive(#(#traits),*)])
        }
    };

    let assert_ident = quote::format_ident!("_AssertActonAgent_{}", name);

    let expanded = quote! {
        #derives
        #input

        #[doc(hidden)]
        #[allow(dead_code, non_camel_case_types, non_snake_case, clippy::needless_lifetimes)]
        const _: () = {
            fn #assert_ident #impl_generics () #where_clause {
                fn assert_bounds<T: Send + 'static>() {}
                assert_bounds::<#name #ty_generics>();
            }
        };
    };

    TokenStream::from(expanded)
}

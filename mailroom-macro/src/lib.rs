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

//! Mailroom Macro Library
//!
//! Provides [`mailroom_service`], which turns an inherent `impl` block into a Mailroom
//! actor stub:
//!
//! ```ignore
//! use mailroom::prelude::*;
//!
//! #[derive(Default)]
//! pub struct Echo;
//!
//! #[mailroom_service]
//! impl Echo {
//!     pub fn echo(&self, text: String) -> String {
//!         text
//!     }
//! }
//! ```
//!
//! Every `pub fn` taking `self` by reference becomes a callable method. Arguments are
//! decoded from JSON with serde, and the return value is encoded back. A method returning
//! `Result` fails the call with its error, which must convert into `ServiceError`.

use proc_macro::TokenStream;

use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{
    parse_macro_input, FnArg, ImplItem, ImplItemFn, ItemImpl, LitStr, Pat, ReturnType, Type,
    Visibility,
};

/// Options parsed from `#[mailroom_service(...)]`.
#[derive(Default)]
struct ServiceOptions {
    /// Overrides the service name, and with it the default address.
    name: Option<LitStr>,
}

/// What the generated stub does with a method's return value.
enum ReturnShape {
    Unit,
    Value,
    Result,
}

fn return_shape(output: &ReturnType) -> ReturnShape {
    let ty = match output {
        ReturnType::Default => return ReturnShape::Unit,
        ReturnType::Type(_, ty) => ty,
    };
    match ty.as_ref() {
        Type::Tuple(tuple) if tuple.elems.is_empty() => ReturnShape::Unit,
        Type::Path(path)
            if path
                .path
                .segments
                .last()
                .is_some_and(|segment| segment.ident == "Result") =>
        {
            ReturnShape::Result
        }
        _ => ReturnShape::Value,
    }
}

fn is_exposed(method: &ImplItemFn) -> bool {
    matches!(method.vis, Visibility::Public(_))
        && matches!(method.sig.inputs.first(), Some(FnArg::Receiver(receiver)) if receiver.reference.is_some())
}

/// Builds the `MethodInfo` expression and the dispatch arm for one method.
fn expand_method(method: &ImplItemFn) -> (TokenStream2, TokenStream2) {
    let ident = &method.sig.ident;
    let name = ident.to_string();

    let mut params = Vec::new();
    let mut decode = Vec::new();
    let mut bindings = Vec::new();
    for (index, input) in method.sig.inputs.iter().skip(1).enumerate() {
        let FnArg::Typed(typed) = input else { continue };
        let ty = &typed.ty;
        let param_name = match typed.pat.as_ref() {
            Pat::Ident(pat) => pat.ident.to_string(),
            _ => format!("arg{index}"),
        };
        let type_name = quote!(#ty).to_string().replace(' ', "");
        let binding = format_ident!("__arg{}", index);
        params.push(quote! { .param(#param_name, #type_name) });
        decode.push(quote! { let #binding: #ty = call.arg(#index)?; });
        bindings.push(binding);
    }

    let returns = match &method.sig.output {
        ReturnType::Default => "()".to_string(),
        ReturnType::Type(_, ty) => quote!(#ty).to_string().replace(' ', ""),
    };
    let info = quote! {
        ::mailroom::prelude::MethodInfo::new(#name) #(#params)* .returns(#returns)
    };

    let invoke = if method.sig.asyncness.is_some() {
        quote! { self.#ident(#(#bindings),*).await }
    } else {
        quote! { self.#ident(#(#bindings),*) }
    };
    let reply = match return_shape(&method.sig.output) {
        ReturnShape::Unit => quote! {
            #invoke;
            Ok(::mailroom::prelude::Reply::null())
        },
        ReturnShape::Value => quote! {
            let out = #invoke;
            ::mailroom::prelude::Reply::json(out)
        },
        ReturnShape::Result => quote! {
            let out = #invoke?;
            ::mailroom::prelude::Reply::json(out)
        },
    };
    let arm = quote! {
        #name => {
            #(#decode)*
            #reply
        }
    };
    (info, arm)
}

/// Generates an `Actor` implementation for the type of an inherent `impl` block.
///
/// Accepts an optional `name = "..."` overriding the service name, which otherwise is the
/// type name.
#[proc_macro_attribute]
pub fn mailroom_service(attr: TokenStream, item: TokenStream) -> TokenStream {
    let mut options = ServiceOptions::default();
    let parser = syn::meta::parser(|meta| {
        if meta.path.is_ident("name") {
            options.name = Some(meta.value()?.parse()?);
            Ok(())
        } else {
            Err(meta.error("unsupported mailroom_service option"))
        }
    });
    parse_macro_input!(attr with parser);

    let item_impl = parse_macro_input!(item as ItemImpl);
    if let Some((_, path, _)) = &item_impl.trait_ {
        return syn::Error::new_spanned(path, "#[mailroom_service] goes on an inherent impl block")
            .to_compile_error()
            .into();
    }

    let self_ty = &item_impl.self_ty;
    let service_name = match (&options.name, self_ty.as_ref()) {
        (Some(name), _) => name.value(),
        (None, Type::Path(path)) => path
            .path
            .segments
            .last()
            .map(|segment| segment.ident.to_string())
            .unwrap_or_default(),
        (None, other) => quote!(#other).to_string(),
    };
    let (impl_generics, _, where_clause) = item_impl.generics.split_for_impl();

    let (infos, arms): (Vec<_>, Vec<_>) = item_impl
        .items
        .iter()
        .filter_map(|item| match item {
            ImplItem::Fn(method) if is_exposed(method) => Some(expand_method(method)),
            _ => None,
        })
        .unzip();

    let expanded = quote! {
        #item_impl

        #[::mailroom::prelude::async_trait]
        impl #impl_generics ::mailroom::prelude::Actor for #self_ty #where_clause {
            fn name(&self) -> &str {
                #service_name
            }

            fn methods(&self) -> ::std::vec::Vec<::mailroom::prelude::MethodInfo> {
                ::std::vec![#(#infos),*]
            }

            async fn invoke(
                &mut self,
                call: &mut ::mailroom::prelude::Call<'_>,
            ) -> ::std::result::Result<::mailroom::prelude::Reply, ::mailroom::prelude::ServiceError> {
                let method = call.method().to_string();
                match method.as_str() {
                    #(#arms)*
                    _ => ::std::result::Result::Err(
                        ::mailroom::prelude::ServiceError::method_not_found(call.address(), &method),
                    ),
                }
            }
        }
    };
    expanded.into()
}

use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, LitStr};

/// Turns a device id literal into a `[u8; 6]` at compile time.
///
/// Octets may be separated by `:` or `-`, or written back to back:
/// `device_id!("a0:b1:c2:d3:e4:f5")`, `device_id!("a0b1c2d3e4f5")`.
#[proc_macro]
pub fn device_id(input: TokenStream) -> TokenStream {
    let lit = parse_macro_input!(input as LitStr);

    let Some(octets) = parse_octets(&lit.value()) else {
        return syn::Error::new_spanned(lit, "device id must be exactly six hex octets")
            .into_compile_error()
            .into();
    };

    let bytes = octets.iter();

    quote! {
        [#(#bytes,)*]
    }
    .into()
}

fn parse_octets(value: &str) -> Option<[u8; 6]> {
    let digits: Vec<u8> = value
        .bytes()
        .filter(|b| *b != b':' && *b != b'-')
        .collect();

    if digits.len() != 12 || !digits.iter().all(u8::is_ascii_hexdigit) {
        return None;
    }

    let mut octets = [0u8; 6];
    for (octet, pair) in octets.iter_mut().zip(digits.chunks(2)) {
        let text = std::str::from_utf8(pair).ok()?;
        *octet = u8::from_str_radix(text, 16).ok()?;
    }

    Some(octets)
}

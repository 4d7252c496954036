//! Implementations of Codec for tuples.
//!
//! Tuples are written as the concatenation of their elements. In a [Dict] they are arrays with
//! one child per element.

use crate::{
    tree::write_sequence_start, DecodeConfig, Dict, EncodeSize, Error, FromDict, Read, ToDict,
    TypeKind, Write,
};
use bytes::{Buf, BufMut};
use paste::paste;

// Tuple implementation
macro_rules! impl_codec_for_tuple {
    ($($index:literal),*) => {
        paste! {
            impl<$( [<T $index>]: EncodeSize ),*> EncodeSize for ( $( [<T $index>], )* ) {
                #[inline]
                fn encode_size(&self) -> usize {
                    0 $( + self.$index.encode_size() )*
                }
            }

            impl<$( [<T $index>]: Write ),*> Write for ( $( [<T $index>], )* ) {
                #[inline]
                fn write(&self, buf: &mut impl BufMut) {
                    $( self.$index.write(buf); )*
                }
            }

            impl<$( [<T $index>]: Read ),*> Read for ( $( [<T $index>], )* ) {
                #[inline]
                fn read(buf: &mut impl Buf) -> Result<Self, Error> {
                    Ok(( $( [<T $index>]::read(buf)?, )* ))
                }
            }

            impl<$( [<T $index>]: ToDict ),*> ToDict for ( $( [<T $index>], )* ) {
                fn to_dict(&self, dict: &mut Dict) {
                    write_sequence_start(dict);
                    $( self.$index.to_dict(dict.add_child(stringify!($index))); )*
                }
            }

            impl<$( [<T $index>]: FromDict ),*> FromDict for ( $( [<T $index>], )* ) {
                fn from_dict(dict: &Dict, config: &DecodeConfig) -> Result<Self, Error> {
                    dict.expect_kind(TypeKind::Array)?;
                    let expected = [$( $index ),*].len();
                    if dict.len() != expected {
                        return Err(Error::InvalidLength(dict.len()));
                    }
                    Ok(( $(
                        match dict.child($index) {
                            Some((_, child)) => [<T $index>]::from_dict(child, config)?,
                            None => return Err(Error::InvalidLength(dict.len())),
                        },
                    )* ))
                }
            }
        }
    };
}

// Generate implementations for tuple sizes 1 through 6
impl_codec_for_tuple!(0);
impl_codec_for_tuple!(0, 1);
impl_codec_for_tuple!(0, 1, 2);
impl_codec_for_tuple!(0, 1, 2, 3);
impl_codec_for_tuple!(0, 1, 2, 3, 4);
impl_codec_for_tuple!(0, 1, 2, 3, 4, 5);

use horizon_ipc::descriptor::{calling_pid_desc, copy_handle_desc, mapped_buffer_desc};
use horizon_ipc::{
    Header, IpcError, MappedBufferPermissions, RequestContext, RequestParser, ResultCode,
    RESULT_SUCCESS,
};

type Ctx = RequestContext<u32>;

#[test]
fn response_fields_parse_back_in_order() {
    let mut ctx = Ctx::new(7);
    ctx.command_buffer_mut()[0] = Header::new(0x10, 0, 0).raw();

    let rp = RequestParser::new(&mut ctx, Header::new(0x10, 0, 0));
    let mut rb = rp.make_builder(6, 0);
    rb.push(RESULT_SUCCESS)
        .push(0x1234_5678u32)
        .push(0x0004_0000_0010_0200u64)
        .push(true)
        .push(*b"cecd:u\0\0");
    drop(rb);

    let shape = ctx.response_shape().unwrap();
    assert!(shape.is_complete(), "{shape:?}");
    assert_eq!(ctx.header(), Header::new(0x10, 6, 0));

    let mut echo = Ctx::from_words(7, ctx.command_buffer());
    let header = echo.header();
    let mut rp = RequestParser::new(&mut echo, header);
    assert_eq!(rp.pop::<ResultCode>(), RESULT_SUCCESS);
    assert_eq!(rp.pop::<u32>(), 0x1234_5678);
    assert_eq!(rp.pop::<u64>(), 0x0004_0000_0010_0200);
    assert!(rp.pop::<bool>());
    assert_eq!(&rp.pop::<[u8; 8]>(), b"cecd:u\0\0");
}

#[test]
fn translate_params_decode_through_the_context() {
    let header = Header::new(0x01, 1, 6);
    let words = [
        header.raw(),
        0x20,
        calling_pid_desc(),
        0, // filled in by the kernel
        copy_handle_desc(1),
        0,
        mapped_buffer_desc(0x20, MappedBufferPermissions::W),
        0,
    ];
    let mut ctx = Ctx::from_words(42, &words);
    // Emulate kernel translation.
    let object = ctx.add_request_object(Some(0xBEEF));
    let buffer_id = ctx.add_mapped_buffer(0x0800_0000, words[6]);
    let cmd = ctx.command_buffer_mut();
    cmd[3] = 42;
    cmd[5] = object;
    cmd[7] = buffer_id;

    let mut rp = RequestParser::new(&mut ctx, header);
    assert_eq!(rp.pop::<u32>(), 0x20);
    assert_eq!(rp.pop_pid().unwrap(), 42);
    assert_eq!(rp.pop_object().unwrap(), Some(0xBEEF));
    let buffer = rp.pop_mapped_buffer().unwrap();
    assert_eq!(buffer.address(), 0x0800_0000);
    assert_eq!(buffer.size(), 0x20);
    assert_eq!(buffer.permissions(), MappedBufferPermissions::W);

    let mut rb = rp.make_builder(1, 2);
    rb.push(RESULT_SUCCESS).push_mapped_buffer(&buffer);
    drop(rb);

    // The re-emitted descriptor is identical to the one the client sent.
    assert_eq!(ctx.command_buffer()[2], words[6]);
    assert_eq!(ctx.command_buffer()[3], buffer.id());
    assert!(ctx.response_shape().unwrap().is_complete());
}

#[test]
fn wrong_descriptor_is_a_precondition_violation() {
    let header = Header::new(0x02, 0, 2);
    let words = [header.raw(), copy_handle_desc(1), 0];
    let mut ctx = Ctx::from_words(1, &words);
    ctx.add_request_object(None);

    let mut rp = RequestParser::new(&mut ctx, header);
    assert!(matches!(
        rp.pop_pid(),
        Err(IpcError::UnexpectedDescriptor { .. })
    ));
}

#[test]
fn short_response_is_reported_incomplete() {
    let header = Header::new(0x03, 0, 0);
    let mut ctx = Ctx::from_words(1, &[header.raw()]);
    let rp = RequestParser::new(&mut ctx, header);
    let mut rb = rp.make_builder(2, 0);
    rb.push(RESULT_SUCCESS);
    drop(rb);

    let shape = ctx.response_shape().unwrap();
    assert!(!shape.is_complete());
    assert_eq!(shape.normal_written, 1);
}

#[test]
fn copied_objects_are_listed_for_the_kernel() {
    let header = Header::new(0x0F, 0, 0);
    let mut ctx = Ctx::from_words(1, &[header.raw()]);
    let rp = RequestParser::new(&mut ctx, header);
    let mut rb = rp.make_builder(1, 3);
    rb.push(RESULT_SUCCESS).push_copy_objects(&[Some(5), Some(9)]);
    drop(rb);

    assert_eq!(ctx.command_buffer()[2], copy_handle_desc(2));
    assert_eq!(ctx.response_objects(), &[Some(5), Some(9)]);
    assert_eq!(ctx.command_buffer()[3], 0);
    assert_eq!(ctx.command_buffer()[4], 1);
    assert!(ctx.response_shape().unwrap().is_complete());
}

#[cfg(not(target_arch = "wasm32"))]
mod prop {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, Clone)]
    enum Field {
        U32(u32),
        U64(u64),
        U16(u16),
        Bool(bool),
        Blob([u8; 6]),
    }

    impl Field {
        fn words(&self) -> u32 {
            match self {
                Field::U64(_) | Field::Blob(_) => 2,
                _ => 1,
            }
        }
    }

    fn field() -> impl Strategy<Value = Field> {
        prop_oneof![
            any::<u32>().prop_map(Field::U32),
            any::<u64>().prop_map(Field::U64),
            any::<u16>().prop_map(Field::U16),
            any::<bool>().prop_map(Field::Bool),
            any::<[u8; 6]>().prop_map(Field::Blob),
        ]
    }

    proptest! {
        #[test]
        fn build_then_parse_preserves_fields(fields in proptest::collection::vec(field(), 0..20)) {
            let normal: u32 = fields.iter().map(Field::words).sum();
            let request = Header::new(0x22, 0, 0);
            let mut ctx = Ctx::from_words(3, &[request.raw()]);
            {
                let rp = RequestParser::new(&mut ctx, request);
                let mut rb = rp.make_builder(normal, 0);
                for f in &fields {
                    match f {
                        Field::U32(v) => rb.push(*v),
                        Field::U64(v) => rb.push(*v),
                        Field::U16(v) => rb.push(*v),
                        Field::Bool(v) => rb.push(*v),
                        Field::Blob(v) => rb.push(*v),
                    };
                }
            }
            prop_assert!(ctx.response_shape().unwrap().is_complete());

            let mut echo = Ctx::from_words(3, ctx.command_buffer());
            let header = echo.header();
            prop_assert_eq!(header.normal_params(), normal);
            let mut rp = RequestParser::new(&mut echo, header);
            for f in &fields {
                match f {
                    Field::U32(v) => prop_assert_eq!(rp.pop::<u32>(), *v),
                    Field::U64(v) => prop_assert_eq!(rp.pop::<u64>(), *v),
                    Field::U16(v) => prop_assert_eq!(rp.pop::<u16>(), *v),
                    Field::Bool(v) => prop_assert_eq!(rp.pop::<bool>(), *v),
                    Field::Blob(v) => prop_assert_eq!(rp.pop::<[u8; 6]>(), *v),
                }
            }
        }
    }
}

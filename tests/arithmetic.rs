mod common;

#[cfg(test)]
mod arithmetic_tests {
    use std::rc::Rc;

    use expression_interpreter as interp;

    use interp::delegate::Func2;
    use interp::types::{EnumType, Primitive};
    use interp::{BinaryOp, Expr, InterpretError, Type, Value};
    use pretty_assertions::assert_eq;

    use super::common::*;

    fn binary(op: BinaryOp, ty: Type, a: Value, b: Value) -> interp::Result<Value> {
        let (x, y) = (param("x", ty.clone()), param("y", ty));
        let f = compile(&[&x, &y], Expr::binary(op, var(&x), var(&y)));
        call(&f, vec![a, b])
    }

    #[test]
    fn test_add_coerced_to_typed_callable() -> anyhow::Result<()> {
        init_logger();

        let (a, b) = (param("a", Type::I32), param("b", Type::I32));
        let f = compile(&[&a, &b], Expr::binary(BinaryOp::Add, var(&a), var(&b)));

        let add: Func2<i32, i32, i32> = f.coerce()?;
        assert_eq!(add(1, 2)?, 3);
        assert_eq!(add(-7, 7)?, 0);
        Ok(())
    }

    #[test]
    fn test_add_across_kinds() {
        let cases = [
            (Type::I8, Value::I8(100), Value::I8(27), Value::I8(127)),
            (Type::U8, Value::U8(250), Value::U8(10), Value::U8(4)),
            (Type::I16, Value::I16(-3), Value::I16(5), Value::I16(2)),
            (Type::U32, Value::U32(7), Value::U32(8), Value::U32(15)),
            (Type::I64, Value::I64(1 << 40), Value::I64(1), Value::I64((1 << 40) + 1)),
            (Type::U64, Value::U64(u64::MAX), Value::U64(2), Value::U64(1)),
            (Type::F32, Value::F32(1.5), Value::F32(2.25), Value::F32(3.75)),
            (Type::F64, Value::F64(0.5), Value::F64(0.25), Value::F64(0.75)),
        ];

        for (ty, a, b, expected) in cases {
            let label = format!("{} + {} : {}", a, b, ty);
            assert_eq!(binary(BinaryOp::Add, ty, a, b).unwrap(), expected, "{}", label);
        }
    }

    #[test]
    fn test_unchecked_arithmetic_wraps() {
        let sum = binary(BinaryOp::Add, Type::I32, Value::I32(i32::MAX), Value::I32(1)).unwrap();
        assert_eq!(sum, Value::I32(i32::MIN));

        let product =
            binary(BinaryOp::Multiply, Type::I16, Value::I16(300), Value::I16(300)).unwrap();
        assert_eq!(product, Value::I16(300i16.wrapping_mul(300)));
    }

    #[test]
    fn test_checked_arithmetic_overflows() {
        let ok = binary(BinaryOp::AddChecked, Type::I32, Value::I32(10), Value::I32(20)).unwrap();
        assert_eq!(ok, Value::I32(30));

        let err = binary(BinaryOp::AddChecked, Type::I32, Value::I32(i32::MAX), Value::I32(1))
            .unwrap_err();
        assert!(matches!(err, InterpretError::ArithmeticOverflow { .. }), "{:?}", err);

        let err = binary(BinaryOp::SubtractChecked, Type::U8, Value::U8(0), Value::U8(1))
            .unwrap_err();
        assert!(matches!(err, InterpretError::ArithmeticOverflow { .. }), "{:?}", err);
    }

    #[test]
    fn test_integer_division_by_zero() {
        let err = binary(BinaryOp::Divide, Type::I32, Value::I32(1), Value::I32(0)).unwrap_err();
        assert_eq!(err, InterpretError::DivisionByZero { ty: "i32".into() });

        let err = binary(BinaryOp::Modulo, Type::U64, Value::U64(9), Value::U64(0)).unwrap_err();
        assert!(matches!(err, InterpretError::DivisionByZero { .. }));

        let quotient = binary(BinaryOp::Divide, Type::F64, Value::F64(1.0), Value::F64(0.0));
        assert_eq!(quotient.unwrap(), Value::F64(f64::INFINITY));
    }

    #[test]
    fn test_comparisons_and_bitwise() {
        let lt = binary(BinaryOp::LessThan, Type::I64, Value::I64(-1), Value::I64(0)).unwrap();
        assert_eq!(lt, Value::Bool(true));

        let ge =
            binary(BinaryOp::GreaterThanOrEqual, Type::F32, Value::F32(1.0), Value::F32(2.0));
        assert_eq!(ge.unwrap(), Value::Bool(false));

        let xor = binary(BinaryOp::ExclusiveOr, Type::U8, Value::U8(0b1100), Value::U8(0b1010));
        assert_eq!(xor.unwrap(), Value::U8(0b0110));

        let shl = binary(BinaryOp::LeftShift, Type::I32, Value::I32(1), Value::I32(4)).unwrap();
        assert_eq!(shl, Value::I32(16));
    }

    #[test]
    fn test_char_arithmetic() {
        let c = param("c", Type::CHAR);
        let f = compile(
            &[&c],
            Expr::binary(BinaryOp::Add, var(&c), Expr::constant('\u{1}')),
        );
        assert_eq!(call(&f, vec![Value::Char('a')]).unwrap(), Value::Char('b'));
    }

    #[test]
    fn test_string_concat_and_equality() {
        let joined = binary(
            BinaryOp::Add,
            Type::String,
            Value::string("foo"),
            Value::string("bar"),
        );
        assert_eq!(joined.unwrap(), Value::string("foobar"));

        let equal = binary(
            BinaryOp::Equal,
            Type::String,
            Value::string("x"),
            Value::string("x"),
        );
        assert_eq!(equal.unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_unsupported_operator() {
        let err = binary(
            BinaryOp::Subtract,
            Type::String,
            Value::string("a"),
            Value::string("b"),
        )
        .unwrap_err();
        assert!(matches!(err, InterpretError::UnsupportedNode { .. }), "{:?}", err);
    }

    #[test]
    fn test_unary_operators() {
        let x = param("x", Type::I32);
        let negate = compile(&[&x], Expr::negate(var(&x)));
        assert_eq!(call(&negate, vec![Value::I32(5)]).unwrap(), Value::I32(-5));
        assert_eq!(
            call(&negate, vec![Value::I32(i32::MIN)]).unwrap(),
            Value::I32(i32::MIN)
        );

        let checked = compile(&[&x], Expr::negate_checked(var(&x)));
        let err = call(&checked, vec![Value::I32(i32::MIN)]).unwrap_err();
        assert!(matches!(err, InterpretError::ArithmeticOverflow { .. }));

        let complement = compile(&[&x], Expr::not(var(&x)));
        assert_eq!(call(&complement, vec![Value::I32(0)]).unwrap(), Value::I32(-1));

        let b = param("b", Type::BOOL);
        let not = compile(&[&b], Expr::not(var(&b)));
        assert_eq!(call(&not, vec![Value::Bool(true)]).unwrap(), Value::Bool(false));
    }

    #[test]
    fn test_conversions() {
        let d = param("d", Type::F64);
        let truncate = compile(&[&d], Expr::convert(var(&d), Type::I32));
        assert_eq!(call(&truncate, vec![Value::F64(3.9)]).unwrap(), Value::I32(3));

        let i = param("i", Type::I32);
        let narrow = compile(&[&i], Expr::convert(var(&i), Type::U8));
        assert_eq!(call(&narrow, vec![Value::I32(300)]).unwrap(), Value::U8(44));

        let narrow_checked = compile(&[&i], Expr::convert_checked(var(&i), Type::U8));
        let err = call(&narrow_checked, vec![Value::I32(300)]).unwrap_err();
        assert!(matches!(err, InterpretError::ArithmeticOverflow { .. }));

        let s = param("s", Type::String);
        let parse = compile(&[&s], Expr::convert_checked(var(&s), Type::I32));
        assert_eq!(call(&parse, vec![Value::string("42")]).unwrap(), Value::I32(42));

        let no_routine = compile(&[&s], Expr::convert_checked(var(&s), Type::array(Type::I32)));
        let err = call(&no_routine, vec![Value::string("42")]).unwrap_err();
        assert!(matches!(err, InterpretError::ConversionFailure { .. }), "{:?}", err);
    }

    #[test]
    fn test_unboxing_conversion() {
        let o = param("o", Type::Object);
        let unbox = compile(&[&o], Expr::convert(var(&o), Type::I64));
        assert_eq!(call(&unbox, vec![Value::I32(7)]).unwrap(), Value::I64(7));

        let err = call(&unbox, vec![Value::Null]).unwrap_err();
        assert!(matches!(err, InterpretError::ConversionFailure { .. }));
    }

    #[test]
    fn test_enum_operations() {
        let color = Rc::new(
            EnumType::new("Color", Primitive::U8)
                .with_variant("Red", 1)
                .with_variant("Blue", 2)
                .with_variant("Magenta", 3),
        );
        let ty = Type::enumeration(Rc::clone(&color));
        let (red, blue) = (Value::enumeration(&color, 1), Value::enumeration(&color, 2));

        let mixed = binary(BinaryOp::Or, ty.clone(), red.clone(), blue.clone()).unwrap();
        assert_eq!(mixed, Value::enumeration(&color, 3));
        assert_eq!(mixed.to_string(), "Magenta");

        let same = binary(BinaryOp::Equal, ty.clone(), red.clone(), red.clone()).unwrap();
        assert_eq!(same, Value::Bool(true));

        let ordered = binary(BinaryOp::LessThan, ty, blue, red).unwrap();
        assert_eq!(ordered, Value::Bool(false));

        let wide = Rc::new(
            EnumType::new("Wide", Primitive::U64).with_variant("All", u64::MAX.into()),
        );
        let x = param("x", Type::U64);
        let round_trip = compile(
            &[&x],
            Expr::convert_checked(
                Expr::convert(var(&x), Type::enumeration(Rc::clone(&wide))),
                Type::U64,
            ),
        );
        assert_eq!(
            call(&round_trip, vec![Value::U64(u64::MAX)]).unwrap(),
            Value::U64(u64::MAX)
        );

        let to_enum = compile(&[&x], Expr::convert(var(&x), Type::enumeration(Rc::clone(&wide))));
        let all = call(&to_enum, vec![Value::U64(u64::MAX)]).unwrap();
        assert_eq!(all, Value::enumeration(&wide, u64::MAX.into()));
        assert_eq!(all.to_string(), "All");
    }

    #[test]
    fn test_each_operand_evaluated_once() {
        let (source, calls) = counting_source("source", Value::I32(4), Type::I32);
        let read = Expr::call_static(source, Vec::new());
        let f = compile(&[], Expr::binary(BinaryOp::Multiply, Rc::clone(&read), read));

        assert_eq!(call(&f, Vec::new()).unwrap(), Value::I32(16));
        assert_eq!(calls.get(), 2);
    }
}

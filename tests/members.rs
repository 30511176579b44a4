mod common;

#[cfg(test)]
mod member_tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use expression_interpreter as interp;

    use interp::expr::{ElementInit, MemberBinding};
    use interp::host::{Constructor, Member, Method};
    use interp::nullable;
    use interp::types::ClassType;
    use interp::value::{ArrayRef, FromValue, ObjectRef};
    use interp::{
        Accessor, BinaryOp, Expr, HostAccessor, InterpretError, Interpreter, Type, Value,
    };
    use pretty_assertions::assert_eq;

    use super::common::*;

    fn field_of(value: &Value, name: &str) -> Value {
        let obj = ObjectRef::from_value(value.clone()).unwrap();
        let field = obj.borrow().get(name).unwrap();
        field
    }

    fn element(value: &Value, indices: &[i64]) -> Value {
        let array = ArrayRef::from_value(value.clone()).unwrap();
        let item = array.borrow().get(indices).unwrap();
        item
    }

    // ── fields and properties ──────────────────────────────────────────────

    #[test]
    fn test_field_read() {
        init_logger();

        let class = slot_class();
        let s = param("s", Type::class(Rc::clone(&class)));
        let f = compile(
            &[&s],
            Expr::binary(BinaryOp::Add, Expr::member(var(&s), count_field()), Expr::constant(1)),
        );

        let slot = Value::object(&class);
        assert_eq!(call(&f, vec![slot.clone()]).unwrap(), Value::I32(1));

        ObjectRef::from_value(slot.clone())
            .unwrap()
            .borrow_mut()
            .set("count", Value::I32(41));
        assert_eq!(call(&f, vec![slot]).unwrap(), Value::I32(42));
    }

    #[test]
    fn test_member_on_null_instance() {
        let class = slot_class();
        let s = param("s", Type::class(class));
        let f = compile(&[&s], Expr::member(var(&s), label_field()));

        let err = call(&f, vec![Value::Null]).unwrap_err();
        assert_eq!(
            err,
            InterpretError::NullReference {
                member: "label".into()
            }
        );
    }

    #[test]
    fn test_property_getter_and_setter() {
        let backing = Rc::new(Cell::new(3));
        let (read, write) = (Rc::clone(&backing), Rc::clone(&backing));
        let level = Member::property("level", Type::I32)
            .with_getter(move |_| Ok(Value::I32(read.get())))
            .with_setter(move |_, value| {
                write.set(i32::from_value(value)?);
                Ok(())
            });

        let class = Rc::new(ClassType::new("Dial"));
        let built = compile(
            &[],
            Expr::member_init(
                Expr::new_default(Type::class(Rc::clone(&class))),
                vec![MemberBinding::assign(level.clone(), Expr::constant(8))],
            ),
        );
        call(&built, Vec::new()).unwrap();
        assert_eq!(backing.get(), 8);

        let d = param("d", Type::class(Rc::clone(&class)));
        let read_level = compile(&[&d], Expr::member(var(&d), level));
        assert_eq!(
            call(&read_level, vec![Value::object(&class)]).unwrap(),
            Value::I32(8)
        );
    }

    #[test]
    fn test_static_members() {
        let config = Rc::new(ClassType::new("Config").with_static("limit", Value::I32(10)));
        let limit = Member::static_field(&config, "limit", Type::I32);
        let version = Member::property("version", Type::String)
            .with_getter(|instance| {
                assert!(instance.is_none());
                Ok(Value::string("1.0"))
            })
            .on_class(&config);

        let f = compile(&[], Expr::static_member(limit.clone()));
        assert_eq!(call(&f, Vec::new()).unwrap(), Value::I32(10));

        let g = compile(&[], Expr::static_member(version));
        assert_eq!(call(&g, Vec::new()).unwrap(), Value::string("1.0"));

        let bump = compile(
            &[],
            Expr::call_static(
                overwriting(Type::I32, Value::I32(11)),
                vec![Expr::static_member(limit)],
            ),
        );
        call(&bump, Vec::new()).unwrap();
        assert_eq!(config.static_field("limit"), Some(Value::I32(11)));
    }

    // ── construction ───────────────────────────────────────────────────────

    #[test]
    fn test_member_init_assigns_fields() {
        let class = slot_class();
        let f = compile(
            &[],
            Expr::member_init(
                Expr::new_default(Type::class(Rc::clone(&class))),
                vec![
                    MemberBinding::assign(count_field(), Expr::constant(5)),
                    MemberBinding::assign(label_field(), Expr::constant("five")),
                ],
            ),
        );

        let slot = call(&f, Vec::new()).unwrap();
        assert_eq!(field_of(&slot, "count"), Value::I32(5));
        assert_eq!(field_of(&slot, "label"), Value::string("five"));
    }

    #[test]
    fn test_nested_member_and_list_bindings() {
        let slot = slot_class();
        let bag = bag_class();
        let holder = Rc::new(
            ClassType::new("Holder")
                .with_field("slot", Type::class(Rc::clone(&slot)))
                .with_field("bag", Type::class(Rc::clone(&bag))),
        );

        let (holder_c, slot_c, bag_c) = (Rc::clone(&holder), Rc::clone(&slot), Rc::clone(&bag));
        let construct = Constructor::new(Vec::new(), move |_| {
            let value = Value::object(&holder_c);
            let obj = ObjectRef::from_value(value.clone())?;
            obj.borrow_mut().set("slot", Value::object(&slot_c));
            obj.borrow_mut().set("bag", Value::object(&bag_c));
            Ok(value)
        });

        let f = compile(
            &[],
            Expr::member_init(
                Expr::new_object(Type::class(holder), construct, Vec::new()),
                vec![
                    MemberBinding::nested(
                        Member::field("slot", Type::class(slot)),
                        vec![MemberBinding::assign(count_field(), Expr::constant(9))],
                    ),
                    MemberBinding::list(
                        Member::field("bag", Type::class(bag)),
                        vec![
                            ElementInit::new(bag_add(), vec![Expr::constant(2)]),
                            ElementInit::new(bag_add(), vec![Expr::constant(3)]),
                        ],
                    ),
                ],
            ),
        );

        let holder = call(&f, Vec::new()).unwrap();
        assert_eq!(field_of(&field_of(&holder, "slot"), "count"), Value::I32(9));
        assert_eq!(field_of(&field_of(&holder, "bag"), "total"), Value::I32(5));
    }

    #[test]
    fn test_list_init() {
        let bag = bag_class();
        let x = param("x", Type::I32);
        let f = compile(
            &[&x],
            Expr::list_init(
                new_bag(&bag),
                vec![
                    ElementInit::new(bag_add(), vec![Expr::constant(1)]),
                    ElementInit::new(bag_add(), vec![var(&x)]),
                ],
            ),
        );

        let result = call(&f, vec![Value::I32(10)]).unwrap();
        assert_eq!(field_of(&result, "total"), Value::I32(11));
    }

    #[test]
    fn test_constructor_arguments() {
        let point = Rc::new(
            ClassType::new("Point")
                .with_field("x", Type::I32)
                .with_field("y", Type::I32),
        );
        let class = Rc::clone(&point);
        let construct = Constructor::new(vec![Type::I32, Type::I32], move |args| {
            let value = Value::object(&class);
            let obj = ObjectRef::from_value(value.clone())?;
            obj.borrow_mut().set("x", args[0].clone());
            obj.borrow_mut().set("y", args[1].clone());
            Ok(value)
        });

        let f = compile(
            &[],
            Expr::new_object(
                Type::class(point),
                construct,
                vec![Expr::constant(3), Expr::constant(4)],
            ),
        );
        let p = call(&f, Vec::new()).unwrap();
        assert_eq!((field_of(&p, "x"), field_of(&p, "y")), (Value::I32(3), Value::I32(4)));
    }

    #[test]
    fn test_default_construction() {
        let f = compile(&[], Expr::new_default(Type::I64));
        assert_eq!(call(&f, Vec::new()).unwrap(), Value::I64(0));

        let pair = Rc::new(ClassType::new("Pair").value_type().with_field("a", Type::BOOL));
        let g = compile(&[], Expr::new_default(Type::class(pair)));
        let value = call(&g, Vec::new()).unwrap();
        assert_eq!(field_of(&value, "a"), Value::Bool(false));
    }

    // ── arrays ─────────────────────────────────────────────────────────────

    #[test]
    fn test_array_init_index_and_length() {
        let numbers = Expr::new_array_init(
            Type::I32,
            vec![Expr::constant(1), Expr::constant(2), Expr::constant(3)],
        );
        assert_eq!(numbers.ty, Type::array(Type::I32));

        let i = param("i", Type::I32);
        let index = compile(&[&i], Expr::array_index(Rc::clone(&numbers), var(&i)));
        assert_eq!(call(&index, vec![Value::I32(1)]).unwrap(), Value::I32(2));

        let err = call(&index, vec![Value::I32(3)]).unwrap_err();
        assert_eq!(err, InterpretError::IndexOutOfRange { index: 3, len: 3 });

        let length = compile(&[], Expr::array_length(numbers));
        assert_eq!(call(&length, Vec::new()).unwrap(), Value::I32(3));
    }

    #[test]
    fn test_array_bounds_and_accessors() {
        let get = Method::array_get(Type::I32, 2, Type::I32);
        let set = Method::array_set(Type::I32, 2, Type::I32);

        let grid = param("grid", Type::array_of_rank(Type::I32, 2));
        let make = compile(
            &[],
            Expr::new_array_bounds(Type::I32, vec![Expr::constant(2), Expr::constant(3)]),
        );
        let value = call(&make, Vec::new()).unwrap();
        let array = ArrayRef::from_value(value.clone()).unwrap();
        assert_eq!(array.borrow().dims(), &[2, 3]);
        assert_eq!(array.borrow().len(), 6);

        let store = compile(
            &[&grid],
            Expr::call(
                var(&grid),
                set,
                vec![Expr::constant(1), Expr::constant(2), Expr::constant(7)],
            ),
        );
        assert_eq!(call(&store, vec![value.clone()]).unwrap(), Value::Unit);

        let load = compile(
            &[&grid],
            Expr::call(var(&grid), get, vec![Expr::constant(1), Expr::constant(2)]),
        );
        assert_eq!(call(&load, vec![value.clone()]).unwrap(), Value::I32(7));
        assert_eq!(element(&value, &[0, 0]), Value::I32(0));
    }

    #[test]
    fn test_negative_bound() {
        let f = compile(&[], Expr::new_array_bounds(Type::I32, vec![Expr::constant(-1)]));
        let err = call(&f, Vec::new()).unwrap_err();
        assert!(matches!(err, InterpretError::InvalidArgument(_)), "{:?}", err);
    }

    #[test]
    fn test_bounds_too_large() {
        let f = compile(
            &[],
            Expr::new_array_bounds(
                Type::I32,
                vec![Expr::constant(1i64 << 32), Expr::constant(1i64 << 32)],
            ),
        );
        let err = call(&f, Vec::new()).unwrap_err();
        assert!(matches!(err, InterpretError::ArithmeticOverflow { .. }), "{:?}", err);
    }

    // ── by-reference write-back ────────────────────────────────────────────

    #[test]
    fn test_array_element_write_back() {
        let arr = param("arr", Type::array(Type::I32));
        let f = compile(
            &[&arr],
            Expr::call_static(
                overwriting(Type::I32, Value::I32(99)),
                vec![Expr::array_index(var(&arr), Expr::constant(1))],
            ),
        );

        let array = Value::array(Type::I32, vec![Value::I32(1), Value::I32(2), Value::I32(3)]);
        call(&f, vec![array.clone()]).unwrap();
        assert_eq!(element(&array, &[0]), Value::I32(1));
        assert_eq!(element(&array, &[1]), Value::I32(99));
    }

    #[test]
    fn test_field_write_back() {
        let class = slot_class();
        let s = param("s", Type::class(Rc::clone(&class)));
        let f = compile(
            &[&s],
            Expr::call_static(
                overwriting(Type::String, Value::string("rewritten")),
                vec![Expr::member(var(&s), label_field())],
            ),
        );

        let slot = Value::object(&class);
        call(&f, vec![slot.clone()]).unwrap();
        assert_eq!(field_of(&slot, "label"), Value::string("rewritten"));
    }

    #[test]
    fn test_multi_dimensional_get_write_back() {
        let grid = param("grid", Type::array_of_rank(Type::I32, 2));
        let f = compile(
            &[&grid],
            Expr::call_static(
                overwriting(Type::I32, Value::I32(-5)),
                vec![Expr::call(
                    var(&grid),
                    Method::array_get(Type::I32, 2, Type::I32),
                    vec![Expr::constant(0), Expr::constant(1)],
                )],
            ),
        );

        let array = interp::value::Array::new(Type::I32, vec![2, 2]).unwrap();
        let value = Value::Array(Rc::new(std::cell::RefCell::new(array)));
        call(&f, vec![value.clone()]).unwrap();
        assert_eq!(element(&value, &[0, 1]), Value::I32(-5));
        assert_eq!(element(&value, &[1, 0]), Value::I32(0));
    }

    #[test]
    fn test_invocation_write_back() {
        let clear = interp::Delegate::from_fn(
            interp::Signature::new(vec![Type::I32], Type::Void),
            |args| {
                args[0] = Value::I32(0);
                Ok(Value::Unit)
            },
        )
        .unwrap();

        let g = param("g", Type::action(vec![Type::I32]));
        let arr = param("arr", Type::array(Type::I32));
        let f = compile(
            &[&g, &arr],
            Expr::invoke(var(&g), vec![Expr::array_index(var(&arr), Expr::constant(0))]),
        );

        let array = Value::array(Type::I32, vec![Value::I32(8)]);
        call(&f, vec![Value::Delegate(clear), array.clone()]).unwrap();
        assert_eq!(element(&array, &[0]), Value::I32(0));
    }

    #[test]
    fn test_plain_arguments_are_not_written_back() {
        let x = param("x", Type::I32);
        let f = compile(
            &[&x],
            Expr::call_static(overwriting(Type::I32, Value::I32(99)), vec![var(&x)]),
        );
        assert_eq!(call(&f, vec![Value::I32(1)]).unwrap(), Value::Unit);
    }

    // ── type tests ─────────────────────────────────────────────────────────

    #[test]
    fn test_type_as_and_type_test() {
        let animal = Rc::new(ClassType::new("Animal"));
        let dog = Rc::new(ClassType::new("Dog").with_base(Rc::clone(&animal)));
        let cat = Rc::new(ClassType::new("Cat").with_base(Rc::clone(&animal)));

        let a = param("a", Type::class(Rc::clone(&animal)));
        let is_dog = compile(&[&a], Expr::type_is(var(&a), Type::class(Rc::clone(&dog))));
        let as_dog = compile(&[&a], Expr::type_as(var(&a), Type::class(Rc::clone(&dog))));

        let rex = Value::object(&dog);
        let tom = Value::object(&cat);

        assert_eq!(call(&is_dog, vec![rex.clone()]).unwrap(), Value::Bool(true));
        assert_eq!(call(&is_dog, vec![tom.clone()]).unwrap(), Value::Bool(false));
        assert_eq!(call(&is_dog, vec![Value::Null]).unwrap(), Value::Bool(false));

        assert_eq!(call(&as_dog, vec![rex.clone()]).unwrap(), rex);
        assert_eq!(call(&as_dog, vec![tom]).unwrap(), Value::Null);
    }

    #[test]
    fn test_reference_equality() {
        let class = slot_class();
        let (a, b) = (
            param("a", Type::class(Rc::clone(&class))),
            param("b", Type::class(Rc::clone(&class))),
        );
        let f = compile(&[&a, &b], Expr::binary(BinaryOp::Equal, var(&a), var(&b)));

        let one = Value::object(&class);
        assert_eq!(call(&f, vec![one.clone(), one.clone()]).unwrap(), Value::Bool(true));
        assert_eq!(
            call(&f, vec![one, Value::object(&class)]).unwrap(),
            Value::Bool(false)
        );
    }

    // ── optional wrapper members ───────────────────────────────────────────

    #[test]
    fn test_optional_members() {
        let x = param("x", Type::nullable(Type::I32));

        let has_value = compile(&[&x], nullable::has_value(var(&x)));
        assert_eq!(call(&has_value, vec![Value::Null]).unwrap(), Value::Bool(false));
        assert_eq!(call(&has_value, vec![Value::I32(1)]).unwrap(), Value::Bool(true));

        let value = compile(&[&x], nullable::value(var(&x)));
        assert_eq!(call(&value, vec![Value::I32(6)]).unwrap(), Value::I32(6));
        let err = call(&value, vec![Value::Null]).unwrap_err();
        assert!(matches!(err, InterpretError::NullValueAccess { .. }), "{:?}", err);

        let or_zero = compile(&[&x], nullable::value_or_default(var(&x), None));
        assert_eq!(call(&or_zero, vec![Value::Null]).unwrap(), Value::I32(0));

        let or_five = compile(&[&x], nullable::value_or_default(var(&x), Some(Expr::constant(5))));
        assert_eq!(call(&or_five, vec![Value::Null]).unwrap(), Value::I32(5));
        assert_eq!(call(&or_five, vec![Value::I32(2)]).unwrap(), Value::I32(2));

        let text = compile(&[&x], nullable::to_string(var(&x)));
        assert_eq!(call(&text, vec![Value::Null]).unwrap(), Value::string(""));
        assert_eq!(call(&text, vec![Value::I32(12)]).unwrap(), Value::string("12"));

        let hash = compile(&[&x], nullable::hash_code(var(&x)));
        assert_eq!(call(&hash, vec![Value::Null]).unwrap(), Value::I32(0));

        let equals = compile(&[&x], nullable::equals(var(&x), Expr::constant(Value::Null)));
        assert_eq!(call(&equals, vec![Value::Null]).unwrap(), Value::Bool(true));
        assert_eq!(call(&equals, vec![Value::I32(1)]).unwrap(), Value::Bool(false));
    }

    #[test]
    fn test_method_on_null_receiver() {
        let class = bag_class();
        let b = param("b", Type::class(class));
        let f = compile(&[&b], Expr::call(var(&b), bag_add(), vec![Expr::constant(1)]));

        let err = call(&f, vec![Value::Null]).unwrap_err();
        assert!(matches!(err, InterpretError::NullReference { .. }), "{:?}", err);
    }

    // ── injected accessor ──────────────────────────────────────────────────

    struct Auditing {
        reads: Rc<Cell<usize>>,
        writes: Rc<Cell<usize>>,
    }

    impl Accessor for Auditing {
        fn get(&self, member: &Member, instance: Option<&Value>) -> interp::Result<Value> {
            self.reads.set(self.reads.get() + 1);
            HostAccessor.get(member, instance)
        }

        fn set(&self, member: &Member, instance: Option<&Value>, value: Value) -> interp::Result<()> {
            self.writes.set(self.writes.get() + 1);
            HostAccessor.set(member, instance, value)
        }
    }

    #[test]
    fn test_custom_accessor() {
        let (reads, writes) = (Rc::new(Cell::new(0)), Rc::new(Cell::new(0)));
        let interpreter = Interpreter::with_accessor(Auditing {
            reads: Rc::clone(&reads),
            writes: Rc::clone(&writes),
        });

        let class = slot_class();
        let s = param("s", Type::class(Rc::clone(&class)));
        let lambda = Expr::lambda(
            vec![Rc::clone(&s)],
            Expr::call_static(
                overwriting(Type::I32, Value::I32(3)),
                vec![Expr::member(var(&s), count_field())],
            ),
        );
        let f = interpreter.interpret(&lambda).unwrap();

        let slot = Value::object(&class);
        call(&f, vec![slot.clone()]).unwrap();
        assert_eq!((reads.get(), writes.get()), (1, 1));
        assert_eq!(field_of(&slot, "count"), Value::I32(3));
    }
}

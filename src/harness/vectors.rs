//! Built-in verification vectors for the bundled exercises.

use super::spec::{Call, Check, PyType, PyValue, Step, VerificationSpec};

use PyValue::{Bool, Int};

fn s(v: &str) -> PyValue {
    PyValue::str(v)
}

fn call(function: &str, args: Vec<PyValue>) -> Call {
    Call::new(function, args)
}

fn new(var: &str, class: &str) -> Step {
    Step::New { var: var.into(), class: class.into() }
}

fn act(var: &str, method: &str, args: Vec<PyValue>) -> Step {
    Step::Do { var: var.into(), method: method.into(), args }
}

fn expect(var: &str, method: &str, args: Vec<PyValue>, expected: PyValue, message: &str) -> Step {
    Step::Expect { var: var.into(), method: method.into(), args, expected, message: message.into() }
}

fn expect_attr(var: &str, path: &str, expected: PyValue, message: &str) -> Step {
    Step::ExpectAttr { var: var.into(), path: path.into(), expected, message: message.into() }
}

fn raises(var: &str, method: &str, exception: &str, message: &str) -> Step {
    Step::ExpectRaises {
        var: var.into(),
        method: method.into(),
        args: vec![],
        exception: exception.into(),
        message: message.into(),
    }
}

fn dict(entries: &[(&str, i64)]) -> PyValue {
    PyValue::Dict(entries.iter().map(|(k, v)| (s(k), Int(*v))).collect())
}

fn matrix(rows: &[&[i64]]) -> PyValue {
    PyValue::List(rows.iter().map(|r| PyValue::ints(r)).collect())
}

pub fn all() -> Vec<VerificationSpec> {
    vec![
        hello_world(),
        reverse_string(),
        sum_list(),
        is_palindrome(),
        sort_list(),
        factorial(),
        fibonacci(),
        gcd(),
        fizzbuzz(),
        is_prime(),
        stack(),
        queue(),
        binary_search_tree(),
        linked_list(),
        decorators(),
        word_count(),
        hanoi(),
        matrix_ops(),
        convert_case(),
    ]
}

fn hello_world() -> VerificationSpec {
    VerificationSpec::new("1", "Your hello_world function correctly returns 'Hello, World!'")
        .function("hello_world")
        .returns(call("hello_world", vec![]), s("Hello, World!"))
}

fn reverse_string() -> VerificationSpec {
    let mut spec = VerificationSpec::new("2", "All test cases passed for reverse_string!").function("reverse_string");
    for (input, expected) in [("hello", "olleh"), ("Python", "nohtyP"), ("", "")] {
        spec = spec.returns(call("reverse_string", vec![s(input)]), s(expected));
    }
    spec
}

fn sum_list() -> VerificationSpec {
    let mut spec = VerificationSpec::new("3", "All test cases passed for sum_list!").function("sum_list");
    for (input, expected) in [(&[1, 2, 3, 4, 5][..], 15), (&[-1, 0, 1][..], 0), (&[][..], 0)] {
        spec = spec.returns(call("sum_list", vec![PyValue::ints(input)]), Int(expected));
    }
    spec
}

fn is_palindrome() -> VerificationSpec {
    let mut spec = VerificationSpec::new("4", "All test cases passed for is_palindrome!").function("is_palindrome");
    for (input, expected) in [
        ("racecar", true),
        ("hello", false),
        ("A man, a plan, a canal, Panama", true),
        ("", true),
    ] {
        spec = spec.returns(call("is_palindrome", vec![s(input)]), Bool(expected));
    }
    spec
}

fn sort_list() -> VerificationSpec {
    let mut spec = VerificationSpec::new("5", "All tests passed!")
        .function("sort_list")
        .check(Check::Arity { function: "sort_list".into(), min: 1, max: 2 });
    for (input, expected) in [
        (&[3, 1, 4, 1, 5][..], &[1, 1, 3, 4, 5][..]),
        (&[][..], &[][..]),
        (&[-5, -1, -3][..], &[-5, -3, -1][..]),
    ] {
        spec = spec
            .returns(call("sort_list", vec![PyValue::ints(input)]), PyValue::ints(expected))
            .check(Check::Unmodified {
                call: call("sort_list", vec![PyValue::ints(input)]),
                message: "Original list was modified".into(),
            });
    }
    spec
}

fn factorial() -> VerificationSpec {
    let mut spec = VerificationSpec::new("7", "All requirements satisfied").function("factorial");
    for (n, expected) in [(5, 120), (0, 1), (1, 1), (10, 3_628_800), (2, 2), (3, 6)] {
        spec = spec.returns(call("factorial", vec![Int(n)]), Int(expected));
    }
    spec.returns_or(
        call("factorial", vec![Int(20)]),
        Int(2_432_902_008_176_640_000),
        "factorial(20) gave incorrect result",
    )
}

fn fibonacci() -> VerificationSpec {
    let mut spec = VerificationSpec::new("8", "All requirements satisfied").function("fibonacci");
    for (n, expected) in [(1, 0), (2, 1), (7, 8), (10, 34), (3, 1), (4, 2), (5, 3)] {
        spec = spec.returns(call("fibonacci", vec![Int(n)]), Int(expected));
    }
    spec.returns_or(call("fibonacci", vec![Int(30)]), Int(514_229), "fibonacci(30) gave incorrect result")
}

fn gcd() -> VerificationSpec {
    let mut spec = VerificationSpec::new("9", "All requirements satisfied").function("gcd");
    for (a, b, expected) in [(56, 98, 14), (17, 23, 1), (0, 5, 5), (48, 18, 6), (0, 0, 0), (12, 18, 6), (1, 1, 1)] {
        spec = spec.returns(call("gcd", vec![Int(a), Int(b)]), Int(expected));
    }
    spec.returns_or(
        call("gcd", vec![Int(123_456), Int(987_654)]),
        Int(6),
        "gcd(123456, 987654) gave incorrect result",
    )
}

fn fizzbuzz() -> VerificationSpec {
    const FIFTEEN: [&str; 15] = [
        "1", "2", "Fizz", "4", "Buzz", "Fizz", "7", "8", "Fizz", "Buzz", "11", "Fizz", "13", "14", "FizzBuzz",
    ];
    let mut sixteen = FIFTEEN.to_vec();
    sixteen.push("16");

    VerificationSpec::new("10", "All FizzBuzz requirements satisfied")
        .function("fizzbuzz")
        .check(Check::ReturnsInstance {
            call: call("fizzbuzz", vec![Int(15)]),
            ty: PyType::List,
            message: "Function should return a list".into(),
        })
        .returns(call("fizzbuzz", vec![Int(15)]), PyValue::strs(&FIFTEEN))
        .returns(call("fizzbuzz", vec![Int(1)]), PyValue::strs(&["1"]))
        .returns(call("fizzbuzz", vec![Int(3)]), PyValue::strs(&["1", "2", "Fizz"]))
        .returns(call("fizzbuzz", vec![Int(5)]), PyValue::strs(&["1", "2", "Fizz", "4", "Buzz"]))
        .returns_or(call("fizzbuzz", vec![Int(16)]), PyValue::strs(&sixteen), "fizzbuzz(16) gave incorrect output")
        .check(Check::Snippet {
            source: [
                "if 'FizzBuzz' in fizzbuzz(14):",
                "    return \"Found FizzBuzz when shouldn't exist\"",
                "if not __coach_b.all(__coach_b.isinstance(x, __coach_b.str) for x in fizzbuzz(2)):",
                "    return 'All elements should be strings'",
            ]
            .join("\n"),
        })
}

fn is_prime() -> VerificationSpec {
    let mut spec = VerificationSpec::new("11", "All prime number checks correct").function("is_prime");
    for (n, expected) in [
        (7, true),
        (4, false),
        (1, false),
        (29, true),
        (100, false),
        (2, true),
        (3, true),
        (9, false),
        (15, false),
        (7919, true),
        (9973, true),
        (9999, false),
    ] {
        spec = spec.returns(call("is_prime", vec![Int(n)]), Bool(expected));
    }
    spec
}

fn stack() -> VerificationSpec {
    VerificationSpec::new("12", "All stack operations working correctly")
        .class("Stack")
        .scenario(vec![
            new("stack", "Stack"),
            expect("stack", "is_empty", vec![], Bool(true), "New stack should be empty"),
            expect("stack", "size", vec![], Int(0), "New stack size should be 0"),
            act("stack", "push", vec![Int(1)]),
            expect("stack", "peek", vec![], Int(1), "peek() should return 1 after pushing 1"),
            expect("stack", "size", vec![], Int(1), "size() should be 1 after one push"),
            act("stack", "push", vec![Int(2)]),
            act("stack", "push", vec![Int(3)]),
            expect("stack", "peek", vec![], Int(3), "peek() should return 3 after pushing 2 then 3"),
            expect("stack", "size", vec![], Int(3), "size() should be 3 after three pushes"),
            expect("stack", "pop", vec![], Int(3), "First pop() should return 3"),
            expect("stack", "pop", vec![], Int(2), "Second pop() should return 2"),
            expect("stack", "size", vec![], Int(1), "size() should be 1 after two pops"),
        ])
        .scenario(vec![
            new("empty", "Stack"),
            raises("empty", "pop", "IndexError", "pop() should raise IndexError on empty stack"),
            raises("empty", "peek", "IndexError", "peek() should raise IndexError on empty stack"),
        ])
        .scenario(vec![
            new("words", "Stack"),
            act("words", "push", vec![s("a")]),
            act("words", "push", vec![s("b")]),
            expect("words", "pop", vec![], s("b"), "Should handle string values"),
        ])
        .scenario(vec![
            new("temp", "Stack"),
            act("temp", "push", vec![Int(1)]),
            expect("temp", "is_empty", vec![], Bool(false), "Stack with items should not be empty"),
            act("temp", "pop", vec![]),
            expect("temp", "is_empty", vec![], Bool(true), "Stack should be empty after pop"),
        ])
}

fn queue() -> VerificationSpec {
    VerificationSpec::new("13", "All queue operations working correctly (FIFO order maintained)")
        .class("Queue")
        .scenario(vec![
            new("queue", "Queue"),
            expect("queue", "is_empty", vec![], Bool(true), "New queue should be empty"),
            expect("queue", "size", vec![], Int(0), "New queue size should be 0"),
            act("queue", "enqueue", vec![Int(1)]),
            expect("queue", "peek", vec![], Int(1), "peek() should return 1 after enqueuing 1"),
            expect("queue", "size", vec![], Int(1), "size() should be 1 after one enqueue"),
            act("queue", "enqueue", vec![Int(2)]),
            act("queue", "enqueue", vec![Int(3)]),
            expect("queue", "peek", vec![], Int(1), "peek() should return first item (1) after enqueuing 2 and 3"),
            expect("queue", "size", vec![], Int(3), "size() should be 3 after three enqueues"),
            expect("queue", "dequeue", vec![], Int(1), "First dequeue() should return 1 (FIFO)"),
            expect("queue", "dequeue", vec![], Int(2), "Second dequeue() should return 2 (FIFO)"),
            expect("queue", "size", vec![], Int(1), "size() should be 1 after two dequeues"),
        ])
        .scenario(vec![
            new("empty", "Queue"),
            raises("empty", "dequeue", "IndexError", "dequeue() should raise IndexError on empty queue"),
            raises("empty", "peek", "IndexError", "peek() should raise IndexError on empty queue"),
        ])
        .scenario(vec![
            new("words", "Queue"),
            act("words", "enqueue", vec![s("a")]),
            act("words", "enqueue", vec![s("b")]),
            expect("words", "dequeue", vec![], s("a"), "Should handle string values (FIFO order)"),
        ])
        .scenario(vec![
            new("order", "Queue"),
            act("order", "enqueue", vec![Int(10)]),
            act("order", "enqueue", vec![Int(20)]),
            act("order", "enqueue", vec![Int(30)]),
            expect("order", "dequeue", vec![], Int(10), "Expected FIFO order, got wrong item at position 0"),
            expect("order", "dequeue", vec![], Int(20), "Expected FIFO order, got wrong item at position 1"),
            expect("order", "dequeue", vec![], Int(30), "Expected FIFO order, got wrong item at position 2"),
            expect("order", "is_empty", vec![], Bool(true), "Queue should be empty after dequeue"),
        ])
}

fn binary_search_tree() -> VerificationSpec {
    VerificationSpec::new("14", "Basic BST operations appear to be working")
        .class("BinarySearchTree")
        .scenario(vec![
            new("bst", "BinarySearchTree"),
            act("bst", "insert", vec![Int(5)]),
            act("bst", "insert", vec![Int(3)]),
            act("bst", "insert", vec![Int(7)]),
            expect("bst", "search", vec![Int(5)], Bool(true), "search method not working correctly"),
            expect("bst", "search", vec![Int(3)], Bool(true), "search should find a value in the left subtree"),
            expect("bst", "search", vec![Int(42)], Bool(false), "search should not find a value that was never inserted"),
            expect(
                "bst",
                "inorder_traversal",
                vec![],
                PyValue::ints(&[3, 5, 7]),
                "inorder_traversal should return values in sorted order",
            ),
            expect("bst", "min_value", vec![], Int(3), "min_value should return the smallest value"),
            expect("bst", "max_value", vec![], Int(7), "max_value should return the largest value"),
        ])
}

fn linked_list() -> VerificationSpec {
    VerificationSpec::new("15", "All linked list operations working correctly")
        .class("Node")
        .class("LinkedList")
        .scenario(vec![
            new("ll", "LinkedList"),
            expect_attr("ll", "head", PyValue::None, "New linked list should have null head and tail"),
            expect_attr("ll", "tail", PyValue::None, "New linked list should have null head and tail"),
            expect("ll", "to_list", vec![], PyValue::ints(&[]), "Empty list should convert to empty Python list"),
            act("ll", "append", vec![Int(1)]),
            expect("ll", "to_list", vec![], PyValue::ints(&[1]), "Append first item failed"),
            expect_attr("ll", "head.value", Int(1), "Head and tail should point to first node"),
            expect_attr("ll", "tail.value", Int(1), "Head and tail should point to first node"),
            act("ll", "append", vec![Int(2)]),
            expect("ll", "to_list", vec![], PyValue::ints(&[1, 2]), "Append second item failed"),
            expect_attr("ll", "tail.value", Int(2), "Tail should point to last node"),
            act("ll", "prepend", vec![Int(0)]),
            expect("ll", "to_list", vec![], PyValue::ints(&[0, 1, 2]), "Prepend item failed"),
            expect_attr("ll", "head.value", Int(0), "Head should point to new first node"),
            expect("ll", "search", vec![Int(1)], Bool(true), "Search failed to find existing item"),
            expect("ll", "search", vec![Int(5)], Bool(false), "Search incorrectly found non-existent item"),
            act("ll", "delete", vec![Int(1)]),
            expect("ll", "to_list", vec![], PyValue::ints(&[0, 2]), "Delete middle item failed"),
            act("ll", "delete", vec![Int(0)]),
            expect("ll", "to_list", vec![], PyValue::ints(&[2]), "Delete first item failed"),
            expect_attr("ll", "head.value", Int(2), "Head and tail should point to remaining node"),
            expect_attr("ll", "tail.value", Int(2), "Head and tail should point to remaining node"),
            act("ll", "delete", vec![Int(2)]),
            expect("ll", "to_list", vec![], PyValue::ints(&[]), "Delete last item failed"),
            expect_attr("ll", "head", PyValue::None, "Empty list should have null head and tail"),
            expect_attr("ll", "tail", PyValue::None, "Empty list should have null head and tail"),
        ])
        .scenario(vec![
            new("dupes", "LinkedList"),
            act("dupes", "append", vec![Int(1)]),
            act("dupes", "append", vec![Int(1)]),
            act("dupes", "delete", vec![Int(1)]),
            expect("dupes", "to_list", vec![], PyValue::ints(&[1]), "Should only delete first occurrence"),
            act("dupes", "delete", vec![Int(99)]),
            expect(
                "dupes",
                "to_list",
                vec![],
                PyValue::ints(&[1]),
                "Deleting non-existent item should not modify list",
            ),
        ])
        .scenario(vec![
            new("words", "LinkedList"),
            act("words", "append", vec![s("a")]),
            act("words", "append", vec![s("b")]),
            act("words", "prepend", vec![s("c")]),
            expect("words", "to_list", vec![], PyValue::strs(&["c", "a", "b"]), "String handling failed"),
        ])
}

const DECORATOR_TIMER: &str = r#"@timer
def timed_function():
    return 'Timed result'
__coach_buffer = __coach_io.StringIO()
__coach_previous = __coach_sys.stdout
__coach_sys.stdout = __coach_buffer
try:
    __coach_result = timed_function()
finally:
    __coach_sys.stdout = __coach_previous
if not __coach_buffer.getvalue().startswith('Execution of timed_function took'):
    return 'timer decorator missing execution time output'
if __coach_result != 'Timed result':
    return 'timer decorator modified return value'"#;

const DECORATOR_DEBUG: &str = r#"@debug
def debug_function(a, b, c=3):
    return a + b + c
__coach_buffer = __coach_io.StringIO()
__coach_previous = __coach_sys.stdout
__coach_sys.stdout = __coach_buffer
try:
    __coach_result = debug_function(1, 2, c=4)
finally:
    __coach_sys.stdout = __coach_previous
for __coach_line in ('Calling debug_function(1, 2, c=4)', 'Returning 7'):
    if __coach_line not in __coach_buffer.getvalue():
        return 'debug decorator missing expected output: ' + __coach_line
if __coach_result != 7:
    return 'debug decorator modified return value'"#;

const DECORATOR_RETRY: &str = r#"@retry(3)
def failing_function(attempts_to_succeed=2):
    failing_function.call_count += 1
    if failing_function.call_count < attempts_to_succeed:
        raise ValueError('Not ready yet')
    return 'Success'
failing_function.call_count = 0
__coach_buffer = __coach_io.StringIO()
__coach_previous = __coach_sys.stdout
__coach_sys.stdout = __coach_buffer
try:
    __coach_result = failing_function(2)
finally:
    __coach_sys.stdout = __coach_previous
if 'Attempt 1/3 failed: Not ready yet' not in __coach_buffer.getvalue():
    return 'retry decorator missing failure message'
if __coach_result != 'Success':
    return "retry decorator didn't return successful result"
@retry(2)
def always_fails():
    always_fails.call_count += 1
    raise RuntimeError('Always fails')
always_fails.call_count = 0
__coach_buffer = __coach_io.StringIO()
__coach_sys.stdout = __coach_buffer
try:
    always_fails()
    return 'retry decorator should have raised exception'
except RuntimeError as __coach_exc:
    if __coach_b.str(__coach_exc) != 'Always fails':
        return 'retry decorator raised wrong exception: ' + __coach_b.str(__coach_exc)
finally:
    __coach_sys.stdout = __coach_previous
if always_fails.call_count != 2:
    return "retry decorator didn't make expected attempts (expected 2, got " + __coach_b.str(always_fails.call_count) + ')'
if 'Attempt 2/2 failed: Always fails' not in __coach_buffer.getvalue():
    return 'retry decorator missing final failure message'"#;

fn decorators() -> VerificationSpec {
    VerificationSpec::new("16", "All decorators working correctly")
        .function("timer")
        .function("debug")
        .function("retry")
        .check(Check::Snippet { source: DECORATOR_TIMER.into() })
        .check(Check::Snippet { source: DECORATOR_DEBUG.into() })
        .check(Check::Snippet { source: DECORATOR_RETRY.into() })
}

fn word_count() -> VerificationSpec {
    VerificationSpec::new("18", "All requirements satisfied")
        .function("word_count")
        .check(Check::ReturnsInstance {
            call: call("word_count", vec![s("Hello world, hello Python!")]),
            ty: PyType::Dict,
            message: "Function should return a dictionary".into(),
        })
        .returns(
            call("word_count", vec![s("Hello world, hello Python!")]),
            dict(&[("hello", 2), ("world", 1), ("python", 1)]),
        )
        .returns(
            call("word_count", vec![s("The quick brown fox jumps over the lazy dog.")]),
            dict(&[
                ("the", 2),
                ("quick", 1),
                ("brown", 1),
                ("fox", 1),
                ("jumps", 1),
                ("over", 1),
                ("lazy", 1),
                ("dog", 1),
            ]),
        )
        .returns_or(call("word_count", vec![s("")]), dict(&[]), "Empty string should return empty dictionary")
        .returns_or(
            call("word_count", vec![s("Hello HELLO hello")]),
            dict(&[("hello", 3)]),
            "Should be case insensitive",
        )
        .returns_or(
            call("word_count", vec![s("word! word? word.")]),
            dict(&[("word", 3)]),
            "Should ignore punctuation",
        )
}

fn hanoi() -> VerificationSpec {
    VerificationSpec::new("19", "All moves valid and correct")
        .function("hanoi")
        .check(Check::PrintsLines {
            call: call("hanoi", vec![Int(3), s("A"), s("B"), s("C")]),
            lines: [
                "Move disk 1 from A to C",
                "Move disk 2 from A to B",
                "Move disk 1 from C to B",
                "Move disk 3 from A to C",
                "Move disk 1 from B to A",
                "Move disk 2 from B to C",
                "Move disk 1 from A to C",
            ]
            .iter()
            .map(|l| l.to_string())
            .collect(),
        })
}

fn matrix_ops() -> VerificationSpec {
    let a = matrix(&[&[1, 2], &[3, 4]]);
    let b = matrix(&[&[5, 6], &[7, 8]]);
    VerificationSpec::new("20", "All matrix operations correct")
        .function("matrix_add")
        .returns(call("matrix_add", vec![a.clone(), b.clone()]), matrix(&[&[6, 8], &[10, 12]]))
        .function("matrix_multiply")
        .returns(call("matrix_multiply", vec![a, b]), matrix(&[&[19, 22], &[43, 50]]))
        .function("matrix_transpose")
        .returns(
            call("matrix_transpose", vec![matrix(&[&[1, 2, 3], &[4, 5, 6]])]),
            matrix(&[&[1, 4], &[2, 5], &[3, 6]]),
        )
        .returns_or(
            call("matrix_add", vec![matrix(&[&[]]), matrix(&[&[]])]),
            matrix(&[&[]]),
            "Empty matrix addition failed",
        )
        .returns_or(
            call("matrix_multiply", vec![matrix(&[&[2]]), matrix(&[&[3]])]),
            matrix(&[&[6]]),
            "1x1 matrix multiplication failed",
        )
}

fn convert_case() -> VerificationSpec {
    let mut spec = VerificationSpec::new("23", "All requirements satisfied").function("convert_case");
    for (text, case, expected) in [
        ("Hello World", "upper", "HELLO WORLD"),
        ("Hello World", "lower", "hello world"),
        ("hello world", "title", "Hello World"),
        ("Hello World", "invalid", "Hello World"),
        ("", "upper", ""),
        ("python programming", "title", "Python Programming"),
    ] {
        spec = spec.returns(call("convert_case", vec![s(text), s(case)]), s(expected));
    }
    spec.returns_or(
        call("convert_case", vec![s("multi word string"), s("title")]),
        s("Multi Word String"),
        "Title case should capitalize each word",
    )
    .returns_or(
        call("convert_case", vec![s("123 numbers"), s("upper")]),
        s("123 NUMBERS"),
        "Should handle numbers correctly",
    )
}
